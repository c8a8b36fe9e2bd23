use crate::libs::core::models::UserId;
use crate::libs::storage::records::UserRecord;
use std::sync::RwLock;

#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

impl From<&UserRecord> for AuthenticatedUser {
    fn from(record: &UserRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            display_name: record.display_name.clone(),
            email: record.email.clone(),
            photo_url: record.photo_url.clone(),
        }
    }
}

/// Source of "who is acting". The relationship layer only ever asks for
/// the id.
pub trait IdentityProvider {
    fn current_user(&self) -> Option<AuthenticatedUser>;

    fn current_user_id(&self) -> Option<UserId> {
        self.current_user().map(|user| user.user_id)
    }
}

/// In-process session holding the signed-in user.
#[derive(Debug, Default)]
pub struct Session {
    current: RwLock<Option<AuthenticatedUser>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: AuthenticatedUser) {
        tracing::info!(user = %user.user_id, "signed in");
        match self.current.write() {
            Ok(mut current) => *current = Some(user),
            Err(poisoned) => *poisoned.into_inner() = Some(user),
        }
    }

    pub fn sign_out(&self) -> Option<AuthenticatedUser> {
        let previous = match self.current.write() {
            Ok(mut current) => current.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(user) = &previous {
            tracing::info!(user = %user.user_id, "signed out");
        }
        previous
    }
}

impl IdentityProvider for Session {
    fn current_user(&self) -> Option<AuthenticatedUser> {
        match self.current.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
