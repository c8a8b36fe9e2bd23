use crate::libs::core::models::UserId;
use crate::libs::storage::records::{RelationshipRecord, UserRecord};
use bincode::error::{DecodeError, EncodeError};
use chrono::{DateTime, Utc};
use flume::Receiver;
use thiserror::Error;

/// A backend that can hand out transactional views of itself.
///
/// Every write made through the closure passed to `with_transaction` lands
/// together or not at all: an `Err` from the closure rolls the transaction
/// back.
pub trait Storage {
    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn ProtocolStore) -> Result<T, E>,
        E: From<StoreError>;

    /// Receives the committed relationship record of `owner_id` after every
    /// transaction that wrote it. Backends opened on the same data share
    /// one feed.
    fn subscribe(&self, owner_id: &UserId) -> Result<Receiver<RelationshipRecord>, StoreError>;
}

pub trait Transactional {
    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

pub trait UserStore {
    fn create_user(&mut self, record: &UserRecord) -> Result<(), StoreError>;
    fn load_user(&mut self, user_id: &UserId) -> Result<Option<UserRecord>, StoreError>;
    fn load_users(&mut self) -> Result<Vec<UserRecord>, StoreError>;
    fn search_users_by_display_name(&mut self, prefix: &str) -> Result<Vec<UserRecord>, StoreError>;
    fn update_presence(
        &mut self,
        user_id: &UserId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

pub trait RelationshipStore {
    /// An owner without a stored record reads as an empty record.
    fn load_relationships(&mut self, owner_id: &UserId) -> Result<RelationshipRecord, StoreError>;
    fn store_relationships(&mut self, record: &RelationshipRecord) -> Result<(), StoreError>;
    fn relationship_owners(&mut self) -> Result<Vec<UserId>, StoreError>;
}

pub trait ProtocolStore: UserStore + RelationshipStore {}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sqlite Error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ConnectionPool Error: {0}")]
    ConnectionPool(#[from] r2d2::Error),
    #[error("Serialisation Error: {0}")]
    Serialisation(#[from] EncodeError),
    #[error("Deserialisation Error: {0}")]
    Deserialisation(#[from] DecodeError),
    #[error("User Already Exists: {0}")]
    UserAlreadyExists(UserId),
    #[error("User Not Found: {0}")]
    UserNotFound(UserId),
    #[error("Transaction Error: {0}")]
    Transaction(String),
}
