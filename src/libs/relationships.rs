//! Bilateral friend-relationship lifecycle.
//!
//! Every user owns one [`RelationshipRecord`]. A bilateral operation reads
//! and rewrites both participants' records inside a single store
//! transaction, so the pair is never left half updated.

use crate::libs::core::models::{Outcome, RelationshipStatus, UserId};
use crate::libs::storage::database::storage_traits::{ProtocolStore, Storage, StoreError};
use crate::libs::storage::records::RelationshipRecord;
use chrono::Utc;
use flume::Receiver;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelationshipError {
    #[error("A user cannot hold a relationship with themselves: {0}")]
    SelfRelationship(UserId),
    #[error("Store Error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeduplicationReport {
    pub records_scanned: usize,
    pub records_cleaned: usize,
    pub entries_removed: usize,
}

pub struct RelationshipManager<S> {
    storage: Arc<S>,
}

impl<S> Clone for RelationshipManager<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> RelationshipManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// `initiator` asks `target` to become friends.
    ///
    /// A no-op when the initiator already holds any entry for the target, or
    /// when the target has blocked the initiator.
    pub fn send_request(
        &self,
        initiator: &UserId,
        target: &UserId,
    ) -> Result<Outcome, RelationshipError> {
        ensure_distinct(initiator, target)?;

        self.storage.with_transaction(|store| {
            let mut mine = store.load_relationships(initiator)?;
            if let Some(existing) = mine.status_of(target) {
                tracing::debug!(%initiator, %target, status = %existing, "request skipped, entry exists");
                return Ok(Outcome::Unchanged);
            }

            let mut theirs = store.load_relationships(target)?;
            if theirs.status_of(initiator) == Some(RelationshipStatus::Blocked) {
                tracing::debug!(%initiator, %target, "request skipped, initiator is blocked");
                return Ok(Outcome::Unchanged);
            }

            let now = Utc::now();
            mine.upsert(target, RelationshipStatus::Pending, now);
            theirs.upsert(initiator, RelationshipStatus::Requested, now);
            write_pair(store, &mine, &theirs)?;

            tracing::info!(%initiator, %target, "friend request sent");
            Ok(Outcome::Applied)
        })
    }

    /// `accepter` accepts the request previously sent by `requester`.
    ///
    /// A no-op unless the accepter holds a `requested` entry and the
    /// requester's side is still `pending` or missing.
    pub fn accept_request(
        &self,
        accepter: &UserId,
        requester: &UserId,
    ) -> Result<Outcome, RelationshipError> {
        ensure_distinct(accepter, requester)?;

        self.storage.with_transaction(|store| {
            let mut mine = store.load_relationships(accepter)?;
            if mine.status_of(requester) != Some(RelationshipStatus::Requested) {
                tracing::debug!(%accepter, %requester, "accept skipped, no incoming request");
                return Ok(Outcome::Unchanged);
            }

            let mut theirs = store.load_relationships(requester)?;
            // a missing requester side is restored, any other status is kept
            match theirs.status_of(accepter) {
                None | Some(RelationshipStatus::Pending) => {}
                Some(status) => {
                    tracing::debug!(%accepter, %requester, %status, "accept skipped, requester side changed");
                    return Ok(Outcome::Unchanged);
                }
            }

            let now = Utc::now();
            mine.upsert(requester, RelationshipStatus::Accepted, now);
            theirs.upsert(accepter, RelationshipStatus::Accepted, now);
            write_pair(store, &mine, &theirs)?;

            tracing::info!(%accepter, %requester, "friend request accepted");
            Ok(Outcome::Applied)
        })
    }

    /// Drops the relationship from both sides whatever its state: cancels an
    /// outgoing request, rejects an incoming one, or removes a friend.
    pub fn cancel_or_reject(&self, user: &UserId, peer: &UserId) -> Result<Outcome, RelationshipError> {
        ensure_distinct(user, peer)?;

        self.storage.with_transaction(|store| {
            let mut mine = store.load_relationships(user)?;
            let mut theirs = store.load_relationships(peer)?;

            let removed_mine = mine.remove(peer);
            let removed_theirs = theirs.remove(user);
            if !removed_mine && !removed_theirs {
                tracing::debug!(%user, %peer, "nothing to cancel");
                return Ok(Outcome::Unchanged);
            }

            if removed_mine {
                store.store_relationships(&mine)?;
            }
            if removed_theirs {
                store.store_relationships(&theirs)?;
            }

            tracing::info!(%user, %peer, "relationship removed");
            Ok(Outcome::Applied)
        })
    }

    /// Marks `peer` as blocked on `user`'s side only.
    pub fn block(&self, user: &UserId, peer: &UserId) -> Result<Outcome, RelationshipError> {
        ensure_distinct(user, peer)?;

        self.storage.with_transaction(|store| {
            let mut mine = store.load_relationships(user)?;
            if mine.status_of(peer) == Some(RelationshipStatus::Blocked) {
                return Ok(Outcome::Unchanged);
            }

            mine.upsert(peer, RelationshipStatus::Blocked, Utc::now());
            store.store_relationships(&mine)?;

            tracing::info!(%user, %peer, "peer blocked");
            Ok(Outcome::Applied)
        })
    }

    /// Restores a blocked entry to `accepted` on `user`'s side only.
    pub fn unblock(&self, user: &UserId, peer: &UserId) -> Result<Outcome, RelationshipError> {
        ensure_distinct(user, peer)?;

        self.storage.with_transaction(|store| {
            let mut mine = store.load_relationships(user)?;
            if mine.status_of(peer) != Some(RelationshipStatus::Blocked) {
                tracing::debug!(%user, %peer, "unblock skipped, peer not blocked");
                return Ok(Outcome::Unchanged);
            }

            mine.upsert(peer, RelationshipStatus::Accepted, Utc::now());
            store.store_relationships(&mine)?;

            tracing::info!(%user, %peer, "peer unblocked");
            Ok(Outcome::Applied)
        })
    }

    pub fn list_friends(&self, user: &UserId) -> Result<Vec<UserId>, RelationshipError> {
        self.peers_with_status(user, RelationshipStatus::Accepted)
    }

    pub fn list_incoming_requests(&self, user: &UserId) -> Result<Vec<UserId>, RelationshipError> {
        self.peers_with_status(user, RelationshipStatus::Requested)
    }

    pub fn list_outgoing_requests(&self, user: &UserId) -> Result<Vec<UserId>, RelationshipError> {
        self.peers_with_status(user, RelationshipStatus::Pending)
    }

    pub fn list_blocked(&self, user: &UserId) -> Result<Vec<UserId>, RelationshipError> {
        self.peers_with_status(user, RelationshipStatus::Blocked)
    }

    pub fn status_between(
        &self,
        user: &UserId,
        peer: &UserId,
    ) -> Result<Option<RelationshipStatus>, RelationshipError> {
        let record = self.record(user)?;
        Ok(record.status_of(peer))
    }

    pub fn record(&self, user: &UserId) -> Result<RelationshipRecord, RelationshipError> {
        self.storage
            .with_transaction(|store| store.load_relationships(user).map_err(RelationshipError::from))
    }

    /// Change feed of `user`'s record.
    pub fn watch(&self, user: &UserId) -> Result<Receiver<RelationshipRecord>, RelationshipError> {
        Ok(self.storage.subscribe(user)?)
    }

    /// Maintenance pass collapsing repeated peers in every stored record,
    /// keeping the first-seen entry. Only records that change are written.
    pub fn deduplicate_all(&self) -> Result<DeduplicationReport, RelationshipError> {
        self.storage.with_transaction(|store| {
            let mut report = DeduplicationReport::default();

            for owner in store.relationship_owners()? {
                let mut record = store.load_relationships(&owner)?;
                report.records_scanned += 1;

                let removed = record.deduplicate();
                if removed == 0 {
                    continue;
                }
                store.store_relationships(&record)?;
                report.records_cleaned += 1;
                report.entries_removed += removed;
                tracing::info!(%owner, removed, "deduplicated relationship record");
            }

            Ok(report)
        })
    }

    fn peers_with_status(
        &self,
        user: &UserId,
        status: RelationshipStatus,
    ) -> Result<Vec<UserId>, RelationshipError> {
        Ok(self.record(user)?.peers_with_status(status))
    }
}

fn ensure_distinct(user: &UserId, peer: &UserId) -> Result<(), RelationshipError> {
    if user == peer {
        return Err(RelationshipError::SelfRelationship(user.clone()));
    }
    Ok(())
}

fn write_pair(
    store: &mut dyn ProtocolStore,
    mine: &RelationshipRecord,
    theirs: &RelationshipRecord,
) -> Result<(), StoreError> {
    store.store_relationships(mine)?;
    store.store_relationships(theirs)
}
