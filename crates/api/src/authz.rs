//! API-side authorization guard.
//!
//! Handlers call [`require`] before touching any store.

use tracing::debug;

use stockroom_auth::{Permission, authorize};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

pub fn require(principal: &PrincipalContext, permission: &Permission) -> Result<(), ApiError> {
    authorize(principal.principal(), permission).map_err(|e| {
        debug!(user_id = %principal.user_id(), role = %principal.role(), %permission, "access denied");
        ApiError::Forbidden(e.to_string())
    })
}
