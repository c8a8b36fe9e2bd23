use crate::libs::core::models::{RelationshipStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(display_name: String, email: String, photo_url: Option<String>) -> Self {
        Self::with_id(UserId::generate(), display_name, email, photo_url)
    }

    /// For users whose id was already issued by the identity provider.
    pub fn with_id(
        user_id: UserId,
        display_name: String,
        email: String,
        photo_url: Option<String>,
    ) -> Self {
        Self {
            user_id,
            display_name,
            email,
            photo_url,
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEntry {
    pub peer_id: UserId,
    pub status: RelationshipStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl RelationshipEntry {
    pub fn new(peer_id: UserId, status: RelationshipStatus, updated_at: DateTime<Utc>) -> Self {
        Self {
            peer_id,
            status,
            updated_at,
        }
    }
}

/// All relationship entries owned by one user, in insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipRecord {
    pub owner_id: UserId,
    pub entries: Vec<RelationshipEntry>,
}

impl RelationshipRecord {
    pub fn empty(owner_id: UserId) -> Self {
        Self {
            owner_id,
            entries: Vec::new(),
        }
    }

    pub fn entry(&self, peer_id: &UserId) -> Option<&RelationshipEntry> {
        self.entries.iter().find(|entry| &entry.peer_id == peer_id)
    }

    pub fn status_of(&self, peer_id: &UserId) -> Option<RelationshipStatus> {
        self.entry(peer_id).map(|entry| entry.status)
    }

    /// Sets the status for `peer_id`, appending an entry when none exists.
    /// Any later duplicates of the peer are dropped so the record leaves
    /// with one entry per peer.
    pub fn upsert(&mut self, peer_id: &UserId, status: RelationshipStatus, at: DateTime<Utc>) {
        let mut seen = false;
        self.entries.retain_mut(|entry| {
            if &entry.peer_id != peer_id {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            entry.status = status;
            entry.updated_at = at;
            true
        });

        if !seen {
            self.entries
                .push(RelationshipEntry::new(peer_id.clone(), status, at));
        }
    }

    /// Removes every entry for `peer_id`. Returns true if anything was removed.
    pub fn remove(&mut self, peer_id: &UserId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.peer_id != peer_id);
        self.entries.len() != before
    }

    /// Peers whose first-seen entry holds `status`, each peer at most once.
    /// Later duplicates never contribute, matching `status_of`.
    pub fn peers_with_status(&self, status: RelationshipStatus) -> Vec<UserId> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(|entry| seen.insert(&entry.peer_id))
            .filter(|entry| entry.status == status)
            .map(|entry| entry.peer_id.clone())
            .collect()
    }

    /// Collapses repeated peers keeping the first-seen entry. Returns how
    /// many entries were dropped.
    pub fn deduplicate(&mut self) -> usize {
        let before = self.entries.len();
        let mut seen = HashSet::new();
        self.entries
            .retain(|entry| seen.insert(entry.peer_id.clone()));
        before - self.entries.len()
    }
}
