use crate::libs::core::models::UserId;
use crate::libs::storage::database::storage_traits::{
    ProtocolStore, RelationshipStore, Storage, StoreError, Transactional, UserStore,
};
use crate::libs::storage::records::{RelationshipRecord, UserRecord};
use crate::libs::storage::subscriptions::Subscribers;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use flume::Receiver;
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, UserRecord>,
    relationships: BTreeMap<UserId, RelationshipRecord>,
}

/// In-process stand-in for the document store. Transactions work on a copy
/// of the state that replaces the original only on commit.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    fail_after_writes: Mutex<Option<usize>>,
    subscribers: Subscribers,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next transaction fail once it has performed `writes`
    /// relationship writes. Used to exercise partial-failure paths.
    pub fn fail_after_writes(&self, writes: usize) {
        if let Ok(mut slot) = self.fail_after_writes.lock() {
            *slot = Some(writes);
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Transaction("memory store poisoned".to_string()))
    }
}

pub struct MemoryTransaction<'s> {
    guard: MutexGuard<'s, MemoryState>,
    working: MemoryState,
    writes_left: Option<usize>,
    written: Vec<RelationshipRecord>,
}

impl<'s> Transactional for MemoryTransaction<'s> {
    fn commit(mut self) -> Result<(), StoreError> {
        *self.guard = self.working;
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Storage for InMemoryStore {
    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn ProtocolStore) -> Result<T, E>,
        E: From<StoreError>,
    {
        let writes_left = self
            .fail_after_writes
            .lock()
            .map_err(|_| StoreError::Transaction("memory store poisoned".to_string()))?
            .take();
        let guard = self.lock_state()?;
        let working = guard.clone();
        let mut transaction = MemoryTransaction {
            guard,
            working,
            writes_left,
            written: Vec::new(),
        };

        match f(&mut transaction) {
            Ok(value) => {
                let written = std::mem::take(&mut transaction.written);
                transaction.commit()?;
                self.subscribers.publish(written);
                Ok(value)
            }
            Err(err) => {
                transaction.rollback()?;
                Err(err)
            }
        }
    }

    fn subscribe(&self, owner_id: &UserId) -> Result<Receiver<RelationshipRecord>, StoreError> {
        self.subscribers.subscribe(owner_id)
    }
}

impl<'s> ProtocolStore for MemoryTransaction<'s> {}

impl<'s> UserStore for MemoryTransaction<'s> {
    fn create_user(&mut self, record: &UserRecord) -> Result<(), StoreError> {
        if self.working.users.contains_key(&record.user_id) {
            return Err(StoreError::UserAlreadyExists(record.user_id.clone()));
        }
        self.working
            .users
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn load_user(&mut self, user_id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.working.users.get(user_id).cloned())
    }

    fn load_users(&mut self) -> Result<Vec<UserRecord>, StoreError> {
        let mut users: Vec<UserRecord> = self.working.users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(users)
    }

    fn search_users_by_display_name(&mut self, prefix: &str) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self
            .load_users()?
            .into_iter()
            .filter(|user| user.display_name.starts_with(prefix))
            .collect())
    }

    fn update_presence(
        &mut self,
        user_id: &UserId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let user = self
            .working
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.clone()))?;
        user.is_online = is_online;
        user.last_seen = Some(at);
        Ok(())
    }
}

impl<'s> RelationshipStore for MemoryTransaction<'s> {
    fn load_relationships(&mut self, owner_id: &UserId) -> Result<RelationshipRecord, StoreError> {
        Ok(self
            .working
            .relationships
            .get(owner_id)
            .cloned()
            .unwrap_or_else(|| RelationshipRecord::empty(owner_id.clone())))
    }

    fn store_relationships(&mut self, record: &RelationshipRecord) -> Result<(), StoreError> {
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(StoreError::Transaction(format!(
                    "injected write failure for {}",
                    record.owner_id
                )));
            }
            *left -= 1;
        }
        self.working
            .relationships
            .insert(record.owner_id.clone(), record.clone());
        self.written.push(record.clone());
        Ok(())
    }

    fn relationship_owners(&mut self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.working.relationships.keys().cloned().collect())
    }
}
