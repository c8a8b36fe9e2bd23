pub mod libs;

use crate::libs::config::ConfigError;
use crate::libs::relationships::RelationshipError;
use crate::libs::storage::database::storage_traits::StoreError;
use thiserror::Error;

pub use crate::libs::ffi::FriendClient;

uniffi::setup_scaffolding!();

/// Errors surfaced to the UI shell. Flattened to their message on the
/// foreign side.
#[derive(Error, Debug, uniffi::Error)]
#[uniffi(flat_error)]
pub enum ClientError {
    #[error("No user is signed in")]
    NotSignedIn,
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Watch Error: {0}")]
    Watch(String),
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Relationship Error: {0}")]
    Relationship(#[from] RelationshipError),
    #[error("Storage Error: {0}")]
    Storage(#[from] StoreError),
}
