//! Tentative local state for UI consumers.
//!
//! A view shows the result of a relationship command immediately, then
//! settles once the store answers. On failure the previous local status is
//! put back.

use crate::libs::core::models::{Outcome, RelationshipStatus, UserId};
use crate::libs::relationships::{RelationshipError, RelationshipManager};
use crate::libs::storage::database::storage_traits::Storage;
use crate::libs::storage::records::RelationshipRecord;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationshipCommand {
    SendRequest,
    AcceptRequest,
    CancelOrReject,
    Block,
    Unblock,
}

impl RelationshipCommand {
    /// Status the acting user's side holds once the command lands.
    pub fn tentative_status(&self) -> Option<RelationshipStatus> {
        match self {
            RelationshipCommand::SendRequest => Some(RelationshipStatus::Pending),
            RelationshipCommand::AcceptRequest => Some(RelationshipStatus::Accepted),
            RelationshipCommand::CancelOrReject => None,
            RelationshipCommand::Block => Some(RelationshipStatus::Blocked),
            RelationshipCommand::Unblock => Some(RelationshipStatus::Accepted),
        }
    }

    pub fn execute<S: Storage>(
        &self,
        manager: &RelationshipManager<S>,
        user: &UserId,
        peer: &UserId,
    ) -> Result<Outcome, RelationshipError> {
        match self {
            RelationshipCommand::SendRequest => manager.send_request(user, peer),
            RelationshipCommand::AcceptRequest => manager.accept_request(user, peer),
            RelationshipCommand::CancelOrReject => manager.cancel_or_reject(user, peer),
            RelationshipCommand::Block => manager.block(user, peer),
            RelationshipCommand::Unblock => manager.unblock(user, peer),
        }
    }
}

/// Per-peer statuses as one user's UI currently displays them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimisticRelationships {
    statuses: HashMap<UserId, RelationshipStatus>,
}

impl OptimisticRelationships {
    pub fn from_record(record: &RelationshipRecord) -> Self {
        let mut statuses = HashMap::new();
        for entry in &record.entries {
            statuses
                .entry(entry.peer_id.clone())
                .or_insert(entry.status);
        }
        Self { statuses }
    }

    pub fn status(&self, peer: &UserId) -> Option<RelationshipStatus> {
        self.statuses.get(peer).copied()
    }

    /// Replaces the local view with the store's committed record, e.g. from
    /// a change feed.
    pub fn sync(&mut self, record: &RelationshipRecord) {
        *self = Self::from_record(record);
    }

    /// Shows `command`'s tentative status for `peer`, runs `remote`, and
    /// reverts to the prior status if `remote` fails. A remote no-op also
    /// reverts since nothing changed in the store.
    pub fn apply<F>(
        &mut self,
        peer: &UserId,
        command: RelationshipCommand,
        remote: F,
    ) -> Result<Outcome, RelationshipError>
    where
        F: FnOnce() -> Result<Outcome, RelationshipError>,
    {
        let previous = self.set(peer, command.tentative_status());

        match remote() {
            Ok(Outcome::Applied) => Ok(Outcome::Applied),
            Ok(Outcome::Unchanged) => {
                self.set(peer, previous);
                Ok(Outcome::Unchanged)
            }
            Err(err) => {
                tracing::warn!(%peer, ?command, error = %err, "reverting optimistic update");
                self.set(peer, previous);
                Err(err)
            }
        }
    }

    /// `apply` wired to the manager on behalf of `user`.
    pub fn dispatch<S: Storage>(
        &mut self,
        manager: &RelationshipManager<S>,
        user: &UserId,
        peer: &UserId,
        command: RelationshipCommand,
    ) -> Result<Outcome, RelationshipError> {
        self.apply(peer, command, || command.execute(manager, user, peer))
    }

    fn set(&mut self, peer: &UserId, status: Option<RelationshipStatus>) -> Option<RelationshipStatus> {
        match status {
            Some(status) => self.statuses.insert(peer.clone(), status),
            None => self.statuses.remove(peer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::storage::database::storage_traits::StoreError;
    use crate::libs::storage::memory::InMemoryStore;
    use std::sync::Arc;

    fn bob() -> UserId {
        UserId::from("bob")
    }

    #[test]
    fn failure_restores_previous_status() {
        let mut view = OptimisticRelationships::default();

        let result = view.apply(&bob(), RelationshipCommand::SendRequest, || {
            Err(RelationshipError::Store(StoreError::Transaction(
                "offline".to_string(),
            )))
        });

        assert!(result.is_err());
        assert_eq!(view.status(&bob()), None);
    }

    #[test]
    fn failed_cancel_puts_entry_back() {
        let mut view = OptimisticRelationships::default();
        view.set(&bob(), Some(RelationshipStatus::Accepted));

        let result = view.apply(&bob(), RelationshipCommand::CancelOrReject, || {
            Err(RelationshipError::Store(StoreError::Transaction(
                "offline".to_string(),
            )))
        });

        assert!(result.is_err());
        assert_eq!(view.status(&bob()), Some(RelationshipStatus::Accepted));
    }

    #[test]
    fn success_keeps_tentative_status() {
        let mut view = OptimisticRelationships::default();

        let outcome = view
            .apply(&bob(), RelationshipCommand::Block, || Ok(Outcome::Applied))
            .unwrap();

        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(view.status(&bob()), Some(RelationshipStatus::Blocked));
    }

    #[test]
    fn dispatch_matches_store_after_success() {
        let manager = RelationshipManager::new(Arc::new(InMemoryStore::new()));
        let alice = UserId::from("alice");
        let mut view = OptimisticRelationships::default();

        let outcome = view
            .dispatch(&manager, &alice, &bob(), RelationshipCommand::SendRequest)
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(
            view,
            OptimisticRelationships::from_record(&manager.record(&alice).unwrap())
        );
    }

    #[test]
    fn dispatch_noop_reverts() {
        let manager = RelationshipManager::new(Arc::new(InMemoryStore::new()));
        let alice = UserId::from("alice");
        let mut view = OptimisticRelationships::default();

        let outcome = view
            .dispatch(&manager, &alice, &bob(), RelationshipCommand::AcceptRequest)
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(view.status(&bob()), None);
    }
}
