use crate::libs::core::models::{RelationshipStatus, UserId};
use crate::libs::core::presence::PresenceLabel;
use crate::libs::relationships::RelationshipError;
use crate::libs::storage::database::storage_traits::{Storage, StoreError};
use crate::libs::storage::records::UserRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A peer's profile joined with how the viewing user relates to them.
#[derive(Clone, Debug, PartialEq)]
pub struct PeerView {
    pub profile: UserRecord,
    pub status: Option<RelationshipStatus>,
    pub presence: PresenceLabel,
}

impl PeerView {
    fn new(profile: UserRecord, status: Option<RelationshipStatus>, now: DateTime<Utc>) -> Self {
        let presence = PresenceLabel::describe(profile.is_online, profile.last_seen, now);
        Self {
            profile,
            status,
            presence,
        }
    }
}

/// Read side over user profiles: resolves display data for relationship
/// listings and keeps the presence fields current.
pub struct UserDirectory<S> {
    storage: Arc<S>,
}

impl<S> Clone for UserDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: Storage> UserDirectory<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub fn register_user(&self, record: UserRecord) -> Result<UserRecord, StoreError> {
        self.storage.with_transaction(|store| {
            store.create_user(&record)?;
            tracing::info!(user = %record.user_id, "user registered");
            Ok(record)
        })
    }

    pub fn profile(&self, user_id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        self.storage.with_transaction(|store| store.load_user(user_id))
    }

    pub fn set_presence(&self, user_id: &UserId, is_online: bool) -> Result<(), StoreError> {
        self.storage
            .with_transaction(|store| store.update_presence(user_id, is_online, Utc::now()))
    }

    /// Accepted peers with their profiles. Peers whose profile is gone are
    /// skipped.
    pub fn friends(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PeerView>, RelationshipError> {
        self.peers_with_status(user_id, RelationshipStatus::Accepted, now)
    }

    pub fn incoming_requests(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PeerView>, RelationshipError> {
        self.peers_with_status(user_id, RelationshipStatus::Requested, now)
    }

    pub fn outgoing_requests(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PeerView>, RelationshipError> {
        self.peers_with_status(user_id, RelationshipStatus::Pending, now)
    }

    pub fn blocked(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PeerView>, RelationshipError> {
        self.peers_with_status(user_id, RelationshipStatus::Blocked, now)
    }

    /// Every other user the viewer is neither friends with nor blocking,
    /// tagged with any pending or incoming request.
    pub fn suggestions(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<PeerView>, RelationshipError> {
        self.storage.with_transaction(|store| {
            let record = store.load_relationships(user_id)?;
            let users = store.load_users()?;

            Ok(users
                .into_iter()
                .filter(|user| &user.user_id != user_id)
                .map(|user| {
                    let status = record.status_of(&user.user_id);
                    (user, status)
                })
                .filter(|(_, status)| {
                    !matches!(
                        status,
                        Some(RelationshipStatus::Accepted) | Some(RelationshipStatus::Blocked)
                    )
                })
                .map(|(user, status)| PeerView::new(user, status, now))
                .collect())
        })
    }

    /// Users whose display name starts with `term`. A blank term matches
    /// nobody.
    pub fn search(
        &self,
        user_id: &UserId,
        term: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PeerView>, RelationshipError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        self.storage.with_transaction(|store| {
            let record = store.load_relationships(user_id)?;
            let users = store.search_users_by_display_name(term)?;

            Ok(users
                .into_iter()
                .filter(|user| &user.user_id != user_id)
                .map(|user| {
                    let status = record.status_of(&user.user_id);
                    PeerView::new(user, status, now)
                })
                .collect())
        })
    }

    fn peers_with_status(
        &self,
        user_id: &UserId,
        status: RelationshipStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<PeerView>, RelationshipError> {
        self.storage.with_transaction(|store| {
            let peers = store.load_relationships(user_id)?.peers_with_status(status);
            let mut views = Vec::with_capacity(peers.len());
            for peer in peers {
                match store.load_user(&peer)? {
                    Some(profile) => views.push(PeerView::new(profile, Some(status), now)),
                    None => tracing::warn!(user = %user_id, %peer, "no profile for related peer"),
                }
            }
            Ok(views)
        })
    }
}
