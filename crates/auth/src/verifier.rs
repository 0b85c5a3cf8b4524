//! Bearer credential verification.
//!
//! Two credential forms are accepted, each behind [`CredentialVerifier`]:
//! hosted identity-provider tokens ([`ProviderTokenVerifier`]) and locally
//! signed legacy tokens ([`LegacyTokenVerifier`]). [`VerifierChain`] tries them
//! in order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{IdentityError, IdentityProvider, Principal, Role, RoleDirectory, decode_legacy_token};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The credential is not valid for this verifier.
    #[error("credential rejected: {0}")]
    Rejected(String),

    /// The verifier could not reach a dependency.
    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn verify(&self, token: &str) -> Result<Principal, VerifyError>;
}

/// Delegates token checks to the identity provider, then reads the role from
/// the role directory.
pub struct ProviderTokenVerifier {
    identity: Arc<dyn IdentityProvider>,
    roles: Arc<dyn RoleDirectory>,
}

impl ProviderTokenVerifier {
    pub fn new(identity: Arc<dyn IdentityProvider>, roles: Arc<dyn RoleDirectory>) -> Self {
        Self { identity, roles }
    }
}

#[async_trait]
impl CredentialVerifier for ProviderTokenVerifier {
    fn name(&self) -> &'static str {
        "identity_provider"
    }

    async fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
        let user = match self.identity.user_for_token(token).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(VerifyError::Rejected("unknown to identity provider".to_string())),
            Err(IdentityError::Unavailable(msg)) => return Err(VerifyError::Unavailable(msg)),
            Err(e) => return Err(VerifyError::Rejected(e.to_string())),
        };

        // A failing lookup is not defaulted to a role.
        let raw_role = self
            .roles
            .role_of(user.id)
            .await
            .map_err(|e| VerifyError::Unavailable(e.to_string()))?;

        Ok(Principal {
            id: user.id,
            role: Role::resolve(raw_role.as_deref()),
            email: user.email,
            name: user.name,
        })
    }
}

/// Verifies HS256 tokens signed with the shared secret.
pub struct LegacyTokenVerifier {
    secret: Vec<u8>,
}

impl LegacyTokenVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, VerifyError> {
        let claims = decode_legacy_token(&self.secret, token, now)
            .map_err(|e| VerifyError::Rejected(e.to_string()))?;

        Ok(Principal {
            id: claims.id,
            role: Role::resolve(claims.role.as_deref()),
            email: claims.email,
            name: claims.name,
        })
    }
}

#[async_trait]
impl CredentialVerifier for LegacyTokenVerifier {
    fn name(&self) -> &'static str {
        "legacy_jwt"
    }

    async fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
        self.verify_at(token, Utc::now())
    }
}

/// Ordered list of verifiers; the first one that accepts wins.
///
/// If none accepts and at least one was unavailable, the result is
/// `Unavailable` rather than `Rejected`.
#[derive(Clone, Default)]
pub struct VerifierChain {
    verifiers: Vec<Arc<dyn CredentialVerifier>>,
}

impl VerifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifiers.push(verifier);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    pub async fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
        let mut unavailable: Option<String> = None;

        for verifier in &self.verifiers {
            match verifier.verify(token).await {
                Ok(principal) => {
                    tracing::debug!(verifier = verifier.name(), user_id = %principal.id, "credential accepted");
                    return Ok(principal);
                }
                Err(VerifyError::Rejected(reason)) => {
                    tracing::debug!(verifier = verifier.name(), %reason, "credential rejected");
                }
                Err(VerifyError::Unavailable(reason)) => {
                    tracing::warn!(verifier = verifier.name(), %reason, "verifier unavailable");
                    unavailable.get_or_insert(reason);
                }
            }
        }

        match unavailable {
            Some(reason) => Err(VerifyError::Unavailable(reason)),
            None => Err(VerifyError::Rejected("no verifier accepted the credential".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Duration;
    use stockroom_core::UserId;

    use super::*;
    use crate::{
        AccountChanges, DirectoryError, IdentityUser, LegacyClaims, NewAccount, encode_legacy_token,
    };

    struct FakeIdentity {
        tokens: HashMap<String, IdentityUser>,
        down: bool,
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn user_for_token(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
            if self.down {
                return Err(IdentityError::Unavailable("connection refused".to_string()));
            }
            Ok(self.tokens.get(token).cloned())
        }

        async fn create_account(&self, _: &NewAccount) -> Result<IdentityUser, IdentityError> {
            unimplemented!()
        }

        async fn update_account(&self, _: UserId, _: &AccountChanges) -> Result<(), IdentityError> {
            unimplemented!()
        }

        async fn delete_account(&self, _: UserId) -> Result<(), IdentityError> {
            unimplemented!()
        }
    }

    struct FakeRoles {
        roles: HashMap<UserId, String>,
        down: bool,
    }

    #[async_trait]
    impl RoleDirectory for FakeRoles {
        async fn role_of(&self, user: UserId) -> Result<Option<String>, DirectoryError> {
            if self.down {
                return Err(DirectoryError::Unavailable("timeout".to_string()));
            }
            Ok(self.roles.get(&user).cloned())
        }
    }

    const SECRET: &[u8] = b"chain-secret";

    fn setup(identity_down: bool, roles_down: bool) -> (VerifierChain, UserId) {
        let user = UserId::new();
        let identity = FakeIdentity {
            tokens: HashMap::from([(
                "provider-token".to_string(),
                IdentityUser {
                    id: user,
                    email: Some("ops@example.com".to_string()),
                    name: Some("Ops".to_string()),
                },
            )]),
            down: identity_down,
        };
        let roles = FakeRoles {
            roles: HashMap::from([(user, "admin".to_string())]),
            down: roles_down,
        };

        let chain = VerifierChain::new()
            .with(Arc::new(ProviderTokenVerifier::new(Arc::new(identity), Arc::new(roles))))
            .with(Arc::new(LegacyTokenVerifier::new(SECRET)));
        (chain, user)
    }

    fn legacy_token(role: Role) -> (String, UserId) {
        let id = UserId::new();
        let claims = LegacyClaims::new(id, role, Utc::now(), Duration::minutes(5));
        (encode_legacy_token(SECRET, &claims).unwrap(), id)
    }

    #[tokio::test]
    async fn provider_token_resolves_role_from_directory() {
        let (chain, user) = setup(false, false);
        let p = chain.verify("provider-token").await.unwrap();
        assert_eq!(p.id, user);
        assert_eq!(p.role, Role::Admin);
        assert_eq!(p.email.as_deref(), Some("ops@example.com"));
    }

    #[tokio::test]
    async fn legacy_token_is_the_fallback() {
        let (chain, _) = setup(false, false);
        let (token, id) = legacy_token(Role::Operator);
        let p = chain.verify(&token).await.unwrap();
        assert_eq!(p.id, id);
        assert_eq!(p.role, Role::Operator);
    }

    #[tokio::test]
    async fn legacy_token_still_works_when_provider_is_down() {
        let (chain, _) = setup(true, false);
        let (token, _) = legacy_token(Role::Admin);
        assert_eq!(chain.verify(&token).await.unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let (chain, _) = setup(false, false);
        assert!(matches!(chain.verify("nope").await, Err(VerifyError::Rejected(_))));
    }

    #[tokio::test]
    async fn outage_is_reported_as_unavailable() {
        let (chain, _) = setup(true, false);
        assert!(matches!(chain.verify("provider-token").await, Err(VerifyError::Unavailable(_))));
    }

    #[tokio::test]
    async fn failing_role_lookup_does_not_default() {
        let (chain, _) = setup(false, true);
        assert!(matches!(chain.verify("provider-token").await, Err(VerifyError::Unavailable(_))));
    }

    #[tokio::test]
    async fn empty_chain_rejects() {
        let chain = VerifierChain::new();
        assert!(chain.is_empty());
        assert!(matches!(chain.verify("x").await, Err(VerifyError::Rejected(_))));
    }
}
