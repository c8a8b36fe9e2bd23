#![allow(dead_code)]

use chat_friends_lib::libs::config::ClientConfig;
use chat_friends_lib::libs::core::models::UserId;
use chat_friends_lib::libs::directory::UserDirectory;
use chat_friends_lib::libs::relationships::RelationshipManager;
use chat_friends_lib::libs::storage::database::database::initialize_database;
use chat_friends_lib::libs::storage::database::storage_sqllite::SqliteStore;
use chat_friends_lib::libs::storage::records::UserRecord;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A fresh database file per test. The directory is removed on drop, so the
/// fixture must outlive every store opened on it.
pub struct TestDb {
    pub dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub manager: RelationshipManager<SqliteStore>,
    pub directory: UserDirectory<SqliteStore>,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create test directory");
        let store = Arc::new(open_store(&db_path(&dir)));
        Self {
            manager: RelationshipManager::new(Arc::clone(&store)),
            directory: UserDirectory::new(Arc::clone(&store)),
            store,
            dir,
        }
    }

    pub fn path(&self) -> PathBuf {
        db_path(&self.dir)
    }

    /// Registers `name` under the id `id`.
    pub fn user(&self, id: &str, name: &str) -> UserId {
        let record = UserRecord::with_id(
            UserId::from(id),
            name.to_string(),
            format!("{}@example.com", id),
            None,
        );
        self.directory
            .register_user(record)
            .expect("Failed to register user")
            .user_id
    }
}

pub fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("friends.db")
}

pub fn config_for(dir: &TempDir) -> ClientConfig {
    ClientConfig::new(db_path(dir))
}

pub fn open_store(path: &PathBuf) -> SqliteStore {
    initialize_database(&ClientConfig::new(path.clone())).expect("Failed to initialise database")
}
