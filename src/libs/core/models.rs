use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier handed out by the identity provider. Opaque to this crate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh identifier for users registered through this crate.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl ToSql for UserId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for UserId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let id = value.as_str()?;
        if id.is_empty() {
            return Err(FromSqlError::InvalidType);
        }
        Ok(UserId(id.to_string()))
    }
}

/// One side's view of a relationship.
///
/// `Pending` is held by whoever sent the request, `Requested` by whoever
/// received it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Pending,
    Requested,
    Accepted,
    Blocked,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStatus::Pending => "pending",
            RelationshipStatus::Requested => "requested",
            RelationshipStatus::Accepted => "accepted",
            RelationshipStatus::Blocked => "blocked",
        }
    }

    /// The status the other side holds when this side holds `self`, if the
    /// pairing is symmetric at all.
    pub fn counterpart(&self) -> Option<RelationshipStatus> {
        match self {
            RelationshipStatus::Pending => Some(RelationshipStatus::Requested),
            RelationshipStatus::Requested => Some(RelationshipStatus::Pending),
            RelationshipStatus::Accepted => Some(RelationshipStatus::Accepted),
            RelationshipStatus::Blocked => None,
        }
    }
}

impl fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a mutating relationship operation. Logical no-ops (duplicate
/// request, missing entry) come back as `Unchanged` rather than an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}
