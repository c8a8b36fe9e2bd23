use chrono::{DateTime, Utc};
use std::fmt;

const RECENT_MINUTES: i64 = 5;
const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * 60;

/// Human facing presence of a peer, derived from the online flag and the
/// last time the peer was seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceLabel {
    Online,
    RecentlyOnline,
    OfflineMinutes(i64),
    OfflineHours(i64),
    OfflineDays(i64),
    Offline,
}

impl PresenceLabel {
    pub fn describe(is_online: bool, last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        if is_online {
            return PresenceLabel::Online;
        }
        let Some(last_seen) = last_seen else {
            return PresenceLabel::Offline;
        };

        // clock skew can put last_seen slightly in the future
        let minutes = (now - last_seen).num_minutes().max(0);
        if minutes < RECENT_MINUTES {
            PresenceLabel::RecentlyOnline
        } else if minutes < MINUTES_PER_HOUR {
            PresenceLabel::OfflineMinutes(minutes)
        } else if minutes < MINUTES_PER_DAY {
            PresenceLabel::OfflineHours(minutes / MINUTES_PER_HOUR)
        } else {
            PresenceLabel::OfflineDays(minutes / MINUTES_PER_DAY)
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, PresenceLabel::Online)
    }
}

impl fmt::Display for PresenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceLabel::Online => write!(f, "online"),
            PresenceLabel::RecentlyOnline => write!(f, "recently online"),
            PresenceLabel::OfflineMinutes(minutes) => write!(f, "offline for {} min", minutes),
            PresenceLabel::OfflineHours(hours) => write!(f, "offline for {} h", hours),
            PresenceLabel::OfflineDays(days) => write!(f, "offline for {} d", days),
            PresenceLabel::Offline => write!(f, "offline"),
        }
    }
}
