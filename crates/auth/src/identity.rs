//! Contracts of the external identity provider and the role directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::UserId;

/// Account as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Credentials for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Changes to an existing account; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl AccountChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.name.is_none()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("account not found")]
    NotFound,

    #[error("identity provider rejected the request: {0}")]
    Rejected(String),

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Hosted identity provider: token introspection and account administration.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a user token. `Ok(None)` means the provider does not accept it.
    async fn user_for_token(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError>;

    async fn create_account(&self, account: &NewAccount) -> Result<IdentityUser, IdentityError>;

    async fn update_account(&self, id: UserId, changes: &AccountChanges) -> Result<(), IdentityError>;

    async fn delete_account(&self, id: UserId) -> Result<(), IdentityError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("role directory unavailable: {0}")]
    Unavailable(String),
}

/// Where role attributes live (the profile table).
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Raw role string on record, or `None` when the user has no profile.
    async fn role_of(&self, user: UserId) -> Result<Option<String>, DirectoryError>;
}
