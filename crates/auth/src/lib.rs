//! `stockroom-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the identity
//! provider and the role directory are traits implemented by infra.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod verifier;

pub use authorize::{AuthzError, authorize, permissions_for};
pub use claims::{LegacyClaims, TokenValidationError, decode_legacy_token, encode_legacy_token, validate_claims};
pub use identity::{
    AccountChanges, DirectoryError, IdentityError, IdentityProvider, IdentityUser, NewAccount,
    RoleDirectory,
};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
pub use verifier::{
    CredentialVerifier, LegacyTokenVerifier, ProviderTokenVerifier, VerifierChain, VerifyError,
};
