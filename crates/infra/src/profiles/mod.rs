//! User profiles: the local mirror of identity accounts that carries roles.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_auth::{DirectoryError, RoleDirectory, Role};
use stockroom_core::UserId;

use crate::store::StoreError;

pub use in_memory::InMemoryProfileStore;
pub use postgres::PostgresProfileStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Changes to a profile; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.role.is_none()
    }

    fn apply(self, profile: &mut Profile, now: DateTime<Utc>) {
        if let Some(email) = self.email {
            profile.email = email;
        }
        if let Some(role) = self.role {
            profile.role = role;
        }
        profile.updated_at = now;
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// All profiles, newest first.
    async fn list(&self) -> Result<Vec<Profile>, StoreError>;

    async fn get(&self, id: UserId) -> Result<Option<Profile>, StoreError>;

    /// Role string exactly as stored.
    async fn raw_role(&self, id: UserId) -> Result<Option<String>, StoreError>;

    /// Insert, or overwrite email and role of an existing profile.
    async fn upsert(&self, id: UserId, email: &str, role: Role, now: DateTime<Utc>) -> Result<Profile, StoreError>;

    /// `Ok(None)` when the profile does not exist.
    async fn update(
        &self,
        id: UserId,
        changes: ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError>;

    /// Returns whether a profile was removed.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;
}

/// Exposes a [`ProfileStore`] as the [`RoleDirectory`] used by token verification.
#[derive(Clone)]
pub struct ProfileRoles {
    profiles: Arc<dyn ProfileStore>,
}

impl ProfileRoles {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl RoleDirectory for ProfileRoles {
    async fn role_of(&self, user: UserId) -> Result<Option<String>, DirectoryError> {
        self.profiles
            .raw_role(user)
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))
    }
}
