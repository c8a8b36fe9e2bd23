use crate::libs::core::models::UserId;
use crate::libs::storage::database::storage_traits::StoreError;
use crate::libs::storage::records::RelationshipRecord;
use flume::{Receiver, Sender, TrySendError};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// Records a listener may have queued before the oldest is dropped. Every
/// record is a full snapshot, so only the newest one matters to a slow
/// listener.
pub const FEED_CAPACITY: usize = 32;

static SHARED: OnceLock<Mutex<HashMap<PathBuf, Weak<Subscribers>>>> = OnceLock::new();

struct Listener {
    sender: Sender<RelationshipRecord>,
    // registry side handle used to evict the oldest queued record
    overflow: Receiver<RelationshipRecord>,
}

impl Listener {
    /// Queues `record`, evicting the oldest one when full. False once the
    /// listener's own receiver is gone.
    fn deliver(&self, mut record: RelationshipRecord) -> bool {
        if self.sender.receiver_count() <= 1 {
            return false;
        }
        loop {
            match self.sender.try_send(record) {
                Ok(()) => return true,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.overflow.try_recv();
                    record = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }
}

/// Fan-out of committed relationship records to per-owner listeners.
#[derive(Default)]
pub struct Subscribers {
    listeners: Mutex<HashMap<UserId, Vec<Listener>>>,
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owners = self.listeners.lock().map(|l| l.len()).unwrap_or_default();
        f.debug_struct("Subscribers").field("owners", &owners).finish()
    }
}

impl Subscribers {
    /// The registry every store opened on `path` in this process publishes
    /// to, so a commit through one store reaches listeners of all of them.
    pub fn shared(path: &Path) -> Arc<Self> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let registries = SHARED.get_or_init(Default::default);
        let mut registries = match registries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        registries.retain(|_, registry| registry.strong_count() > 0);

        if let Some(existing) = registries.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let fresh = Arc::new(Self::default());
        registries.insert(key, Arc::downgrade(&fresh));
        fresh
    }

    pub fn subscribe(&self, owner_id: &UserId) -> Result<Receiver<RelationshipRecord>, StoreError> {
        let (sender, receiver) = flume::bounded(FEED_CAPACITY);
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|_| StoreError::Transaction("subscriber registry poisoned".to_string()))?;
        listeners.entry(owner_id.clone()).or_default().push(Listener {
            sender,
            overflow: receiver.clone(),
        });
        Ok(receiver)
    }

    /// Delivers each record to the listeners of its owner. Listeners whose
    /// receiver was dropped are forgotten.
    pub fn publish(&self, records: Vec<RelationshipRecord>) {
        if records.is_empty() {
            return;
        }
        let Ok(mut listeners) = self.listeners.lock() else {
            tracing::warn!("subscriber registry poisoned, dropping change notifications");
            return;
        };

        for record in records {
            let Some(owned) = listeners.get_mut(&record.owner_id) else {
                continue;
            };
            owned.retain(|listener| listener.deliver(record.clone()));
            if owned.is_empty() {
                listeners.remove(&record.owner_id);
            }
        }
    }
}
