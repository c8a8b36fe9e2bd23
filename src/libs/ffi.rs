pub mod models;

use crate::libs::config::ClientConfig;
use crate::libs::core::models::{Outcome, UserId};
use crate::libs::directory::{PeerView, UserDirectory};
use crate::libs::ffi::models::{
    DeduplicationSummary, Peer, PeerRelationship, Profile, RelationshipState,
};
use crate::libs::identity::{AuthenticatedUser, IdentityProvider, Session};
use crate::libs::relationships::{RelationshipError, RelationshipManager};
use crate::libs::storage::database::database::initialize_database;
use crate::libs::storage::database::storage_sqllite::SqliteStore;
use crate::libs::storage::records::{RelationshipRecord, UserRecord};
use crate::libs::telemetry;
use crate::ClientError;
use chrono::Utc;
use flume::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WATCH_POLL: Duration = Duration::from_millis(200);

/// Implemented by the UI shell to hear about committed changes to the
/// signed-in user's relationships, whichever client made them.
#[uniffi::export(callback_interface)]
pub trait RelationshipListener: Send + Sync {
    fn on_relationships_changed(&self, relationships: Vec<PeerRelationship>);
}

/// Handle of a running watch. Cancelled on drop.
#[derive(uniffi::Object)]
pub struct RelationshipWatch {
    stop: Arc<AtomicBool>,
}

#[uniffi::export]
impl RelationshipWatch {
    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Drop for RelationshipWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Entry point for the UI shell. One client per signed-in device.
#[derive(uniffi::Object)]
pub struct FriendClient {
    manager: RelationshipManager<SqliteStore>,
    directory: UserDirectory<SqliteStore>,
    session: Session,
}

impl FriendClient {
    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        telemetry::init_tracing(&config.log_filter);

        let store = Arc::new(initialize_database(&config)?);
        let client = Self {
            manager: RelationshipManager::new(Arc::clone(&store)),
            directory: UserDirectory::new(store),
            session: Session::new(),
        };

        if config.dedupe_on_open {
            let report = client.manager.deduplicate_all()?;
            tracing::info!(
                scanned = report.records_scanned,
                cleaned = report.records_cleaned,
                removed = report.entries_removed,
                "startup deduplication finished"
            );
        }
        Ok(client)
    }

    pub fn manager(&self) -> &RelationshipManager<SqliteStore> {
        &self.manager
    }

    fn signed_in(&self) -> Result<UserId, ClientError> {
        self.session
            .current_user_id()
            .ok_or(ClientError::NotSignedIn)
    }

    fn mutate<F>(&self, operation: &str, peer_id: String, f: F) -> Result<bool, ClientError>
    where
        F: FnOnce(&RelationshipManager<SqliteStore>, &UserId, &UserId) -> Result<Outcome, RelationshipError>,
    {
        let result = self.signed_in().and_then(|user| {
            let peer = parse_user_id(peer_id)?;
            Ok(f(&self.manager, &user, &peer)?.is_applied())
        });
        logged(operation, result)
    }

    fn list<F>(&self, operation: &str, f: F) -> Result<Vec<Peer>, ClientError>
    where
        F: FnOnce(&UserDirectory<SqliteStore>, &UserId) -> Result<Vec<PeerView>, RelationshipError>,
    {
        let result = self.signed_in().and_then(|user| {
            let views = f(&self.directory, &user)?;
            Ok(views.into_iter().map(Peer::from).collect())
        });
        logged(operation, result)
    }
}

#[uniffi::export]
impl FriendClient {
    #[uniffi::constructor]
    pub fn open(database_path: String) -> Result<Arc<Self>, ClientError> {
        let mut config = ClientConfig::from_env()?;
        config.database_path = database_path.into();
        Ok(Arc::new(Self::with_config(config)?))
    }

    #[uniffi::constructor]
    pub fn from_env() -> Result<Arc<Self>, ClientError> {
        Ok(Arc::new(Self::with_config(ClientConfig::from_env()?)?))
    }

    pub fn register(
        &self,
        display_name: String,
        email: String,
        photo_url: Option<String>,
    ) -> Result<Profile, ClientError> {
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(ClientError::InvalidArgument("display name is empty".to_string()));
        }
        let record = UserRecord::new(display_name, email, photo_url);
        logged("register", self.directory.register_user(record).map(Profile::from).map_err(ClientError::from))
    }

    /// Signs `user_id` in and marks them online.
    pub fn sign_in(&self, user_id: String) -> Result<Profile, ClientError> {
        let result = parse_user_id(user_id).and_then(|user_id| {
            let record = self
                .directory
                .profile(&user_id)?
                .ok_or_else(|| ClientError::UnknownUser(user_id.to_string()))?;
            self.session.sign_in(AuthenticatedUser::from(&record));
            self.directory.set_presence(&user_id, true)?;

            let refreshed = self.directory.profile(&user_id)?.unwrap_or(record);
            Ok(Profile::from(refreshed))
        });
        logged("sign_in", result)
    }

    /// Marks the current user offline and ends the session.
    pub fn sign_out(&self) -> Result<(), ClientError> {
        let Some(user) = self.session.sign_out() else {
            return Ok(());
        };
        logged(
            "sign_out",
            self.directory
                .set_presence(&user.user_id, false)
                .map_err(ClientError::from),
        )
    }

    pub fn current_user(&self) -> Option<Profile> {
        let user = self.session.current_user()?;
        match self.directory.profile(&user.user_id) {
            Ok(record) => record.map(Profile::from),
            Err(err) => {
                tracing::error!(error = %err, "failed to load current profile");
                None
            }
        }
    }

    pub fn set_online(&self, is_online: bool) -> Result<(), ClientError> {
        let result = self
            .signed_in()
            .and_then(|user| Ok(self.directory.set_presence(&user, is_online)?));
        logged("set_online", result)
    }

    pub fn send_request(&self, peer_id: String) -> Result<bool, ClientError> {
        self.mutate("send_request", peer_id, |manager, user, peer| {
            manager.send_request(user, peer)
        })
    }

    pub fn accept_request(&self, peer_id: String) -> Result<bool, ClientError> {
        self.mutate("accept_request", peer_id, |manager, user, peer| {
            manager.accept_request(user, peer)
        })
    }

    pub fn cancel_or_reject(&self, peer_id: String) -> Result<bool, ClientError> {
        self.mutate("cancel_or_reject", peer_id, |manager, user, peer| {
            manager.cancel_or_reject(user, peer)
        })
    }

    pub fn block(&self, peer_id: String) -> Result<bool, ClientError> {
        self.mutate("block", peer_id, |manager, user, peer| manager.block(user, peer))
    }

    pub fn unblock(&self, peer_id: String) -> Result<bool, ClientError> {
        self.mutate("unblock", peer_id, |manager, user, peer| manager.unblock(user, peer))
    }

    pub fn relationship_with(&self, peer_id: String) -> Result<Option<RelationshipState>, ClientError> {
        let result = self.signed_in().and_then(|user| {
            let peer = parse_user_id(peer_id)?;
            let status = self.manager.status_between(&user, &peer)?;
            Ok(status.map(RelationshipState::from))
        });
        logged("relationship_with", result)
    }

    pub fn friends(&self) -> Result<Vec<Peer>, ClientError> {
        self.list("friends", |directory, user| directory.friends(user, Utc::now()))
    }

    pub fn incoming_requests(&self) -> Result<Vec<Peer>, ClientError> {
        self.list("incoming_requests", |directory, user| {
            directory.incoming_requests(user, Utc::now())
        })
    }

    pub fn outgoing_requests(&self) -> Result<Vec<Peer>, ClientError> {
        self.list("outgoing_requests", |directory, user| {
            directory.outgoing_requests(user, Utc::now())
        })
    }

    pub fn blocked(&self) -> Result<Vec<Peer>, ClientError> {
        self.list("blocked", |directory, user| directory.blocked(user, Utc::now()))
    }

    pub fn suggestions(&self) -> Result<Vec<Peer>, ClientError> {
        self.list("suggestions", |directory, user| {
            directory.suggestions(user, Utc::now())
        })
    }

    pub fn search_users(&self, term: String) -> Result<Vec<Peer>, ClientError> {
        self.list("search_users", |directory, user| {
            directory.search(user, &term, Utc::now())
        })
    }

    /// Forwards every committed change of the signed-in user's record to
    /// `listener` from a background thread until the watch is cancelled.
    pub fn watch_relationships(
        &self,
        listener: Box<dyn RelationshipListener>,
    ) -> Result<Arc<RelationshipWatch>, ClientError> {
        let result = self.signed_in().and_then(|user| {
            let feed = self.manager.watch(&user)?;
            let stop = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop);
            thread::Builder::new()
                .name(format!("relationship-watch-{}", user))
                .spawn(move || forward_changes(feed, listener, flag))
                .map_err(|err| ClientError::Watch(err.to_string()))?;
            tracing::debug!(%user, "relationship watch started");
            Ok(Arc::new(RelationshipWatch { stop }))
        });
        logged("watch_relationships", result)
    }

    pub fn deduplicate_all(&self) -> Result<DeduplicationSummary, ClientError> {
        let result = self
            .manager
            .deduplicate_all()
            .map(DeduplicationSummary::from)
            .map_err(ClientError::from);
        logged("deduplicate_all", result)
    }
}

fn forward_changes(
    feed: Receiver<RelationshipRecord>,
    listener: Box<dyn RelationshipListener>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        match feed.recv_timeout(WATCH_POLL) {
            Ok(record) => listener.on_relationships_changed(PeerRelationship::from_record(&record)),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!("relationship watch stopped");
}

fn parse_user_id(raw: String) -> Result<UserId, ClientError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidArgument("user id is empty".to_string()));
    }
    Ok(UserId::from(trimmed))
}

fn logged<T>(operation: &str, result: Result<T, ClientError>) -> Result<T, ClientError> {
    if let Err(err) = &result {
        tracing::error!(operation, error = %err, "client operation failed");
    }
    result
}
