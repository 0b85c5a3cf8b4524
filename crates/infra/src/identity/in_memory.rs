use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use stockroom_auth::{AccountChanges, IdentityError, IdentityProvider, IdentityUser, NewAccount};
use stockroom_core::UserId;

#[derive(Debug, Default)]
struct Accounts {
    users: HashMap<UserId, IdentityUser>,
    /// Opaque bearer token -> account.
    tokens: HashMap<String, UserId>,
}

/// Identity provider kept in process, for development and tests.
///
/// Passwords are accepted but not stored; tokens are minted with
/// [`InMemoryIdentityProvider::issue_token`].
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    inner: RwLock<Accounts>,
}

fn poisoned() -> IdentityError {
    IdentityError::Unavailable("identity store lock poisoned".to_string())
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new opaque token for an existing account.
    pub fn issue_token(&self, id: UserId) -> Result<String, IdentityError> {
        let mut accounts = self.inner.write().map_err(|_| poisoned())?;
        if !accounts.users.contains_key(&id) {
            return Err(IdentityError::NotFound);
        }
        let token = format!("dev-{}", Uuid::new_v4().simple());
        accounts.tokens.insert(token.clone(), id);
        Ok(token)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn user_for_token(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let accounts = self.inner.read().map_err(|_| poisoned())?;
        Ok(accounts
            .tokens
            .get(token)
            .and_then(|id| accounts.users.get(id))
            .cloned())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<IdentityUser, IdentityError> {
        let mut accounts = self.inner.write().map_err(|_| poisoned())?;
        let taken = accounts
            .users
            .values()
            .any(|u| u.email.as_deref() == Some(account.email.as_str()));
        if taken {
            return Err(IdentityError::Rejected("email already registered".to_string()));
        }

        let user = IdentityUser {
            id: UserId::new(),
            email: Some(account.email.clone()),
            name: account.name.clone(),
        };
        accounts.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_account(&self, id: UserId, changes: &AccountChanges) -> Result<(), IdentityError> {
        let mut accounts = self.inner.write().map_err(|_| poisoned())?;
        if let Some(email) = &changes.email {
            let taken = accounts
                .users
                .values()
                .any(|u| u.id != id && u.email.as_deref() == Some(email.as_str()));
            if taken {
                return Err(IdentityError::Rejected("email already registered".to_string()));
            }
        }

        let user = accounts.users.get_mut(&id).ok_or(IdentityError::NotFound)?;
        if let Some(email) = &changes.email {
            user.email = Some(email.clone());
        }
        if let Some(name) = &changes.name {
            user.name = Some(name.clone());
        }
        Ok(())
    }

    async fn delete_account(&self, id: UserId) -> Result<(), IdentityError> {
        let mut accounts = self.inner.write().map_err(|_| poisoned())?;
        accounts.users.remove(&id).ok_or(IdentityError::NotFound)?;
        accounts.tokens.retain(|_, owner| *owner != id);
        Ok(())
    }
}
