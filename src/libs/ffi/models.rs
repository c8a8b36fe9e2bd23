// Types handed across the foreign-function boundary to the UI shell

use crate::libs::core::models::RelationshipStatus;
use crate::libs::directory::PeerView;
use crate::libs::relationships::DeduplicationReport;
use crate::libs::storage::records::{RelationshipRecord, UserRecord};
use std::collections::HashSet;

#[derive(Clone, Copy, Hash, Eq, PartialEq, uniffi::Enum, Debug)]
pub enum RelationshipState {
    Pending,
    Requested,
    Accepted,
    Blocked,
}

impl From<RelationshipStatus> for RelationshipState {
    fn from(status: RelationshipStatus) -> Self {
        match status {
            RelationshipStatus::Pending => RelationshipState::Pending,
            RelationshipStatus::Requested => RelationshipState::Requested,
            RelationshipStatus::Accepted => RelationshipState::Accepted,
            RelationshipStatus::Blocked => RelationshipState::Blocked,
        }
    }
}

#[derive(Clone, PartialEq, uniffi::Record, Debug)]
pub struct Profile {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub is_online: bool,
    pub last_seen_ms: Option<i64>,
}

impl From<UserRecord> for Profile {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.user_id.to_string(),
            display_name: record.display_name,
            email: record.email,
            photo_url: record.photo_url,
            is_online: record.is_online,
            last_seen_ms: record.last_seen.map(|at| at.timestamp_millis()),
        }
    }
}

#[derive(Clone, PartialEq, uniffi::Record, Debug)]
pub struct Peer {
    pub profile: Profile,
    pub relationship: Option<RelationshipState>,
    pub presence: String,
}

impl From<PeerView> for Peer {
    fn from(view: PeerView) -> Self {
        Self {
            presence: view.presence.to_string(),
            relationship: view.status.map(RelationshipState::from),
            profile: Profile::from(view.profile),
        }
    }
}

/// One line of a relationship change notification.
#[derive(Clone, PartialEq, uniffi::Record, Debug)]
pub struct PeerRelationship {
    pub peer_id: String,
    pub relationship: RelationshipState,
}

impl PeerRelationship {
    /// The record's entries, first-seen entry per peer.
    pub fn from_record(record: &RelationshipRecord) -> Vec<Self> {
        let mut seen = HashSet::new();
        record
            .entries
            .iter()
            .filter(|entry| seen.insert(&entry.peer_id))
            .map(|entry| Self {
                peer_id: entry.peer_id.to_string(),
                relationship: RelationshipState::from(entry.status),
            })
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, uniffi::Record, Debug)]
pub struct DeduplicationSummary {
    pub records_scanned: u64,
    pub records_cleaned: u64,
    pub entries_removed: u64,
}

impl From<DeduplicationReport> for DeduplicationSummary {
    fn from(report: DeduplicationReport) -> Self {
        Self {
            records_scanned: report.records_scanned as u64,
            records_cleaned: report.records_cleaned as u64,
            entries_removed: report.entries_removed as u64,
        }
    }
}
