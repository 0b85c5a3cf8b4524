use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_auth::Role;
use stockroom_core::UserId;

use super::{Profile, ProfileChanges, ProfileStore};
use crate::store::{StoreError, lock_poisoned};

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    inner: RwLock<HashMap<UserId, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn list(&self) -> Result<Vec<Profile>, StoreError> {
        let map = self.inner.read().map_err(|_| lock_poisoned())?;
        let mut profiles: Vec<Profile> = map.values().cloned().collect();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(profiles)
    }

    async fn get(&self, id: UserId) -> Result<Option<Profile>, StoreError> {
        let map = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn raw_role(&self, id: UserId) -> Result<Option<String>, StoreError> {
        let map = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(map.get(&id).map(|p| p.role.as_str().to_string()))
    }

    async fn upsert(&self, id: UserId, email: &str, role: Role, now: DateTime<Utc>) -> Result<Profile, StoreError> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned())?;
        let profile = map
            .entry(id)
            .and_modify(|p| {
                p.email = email.to_string();
                p.role = role;
                p.updated_at = now;
            })
            .or_insert_with(|| Profile {
                id,
                email: email.to_string(),
                role,
                created_at: now,
                updated_at: now,
            });
        Ok(profile.clone())
    }

    async fn update(
        &self,
        id: UserId,
        changes: ProfileChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>, StoreError> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned())?;
        Ok(map.get_mut(&id).map(|p| {
            changes.apply(p, now);
            p.clone()
        }))
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| lock_poisoned())?;
        Ok(map.remove(&id).is_some())
    }
}
