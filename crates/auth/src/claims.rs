//! Locally-signed (legacy) bearer tokens.
//!
//! These are HS256 JWTs signed with a shared secret. They predate the hosted
//! identity provider and are still accepted as a fallback.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::UserId;

use crate::Role;

/// Clock skew tolerated for `iat`.
const IAT_LEEWAY_SECS: i64 = 60;

/// Claims carried by a legacy token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyClaims {
    /// Subject: the user id.
    pub id: UserId,

    /// Role name as issued; mapped with [`Role::resolve`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl LegacyClaims {
    pub fn new(id: UserId, role: Role, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id,
            role: Some(role.as_str().to_string()),
            email: None,
            name: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed or unsigned token: {0}")]
    Malformed(String),
}

/// Deterministically validate the time window of decoded claims.
pub fn validate_claims(claims: &LegacyClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now + IAT_LEEWAY_SECS < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

pub fn encode_legacy_token(secret: &[u8], claims: &LegacyClaims) -> Result<String, TokenValidationError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenValidationError::Malformed(e.to_string()))
}

/// Verify the signature, decode, and check the time window at `now`.
pub fn decode_legacy_token(
    secret: &[u8],
    token: &str,
    now: DateTime<Utc>,
) -> Result<LegacyClaims, TokenValidationError> {
    // Time checks are done by `validate_claims` against the injected clock.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<LegacyClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

    validate_claims(&data.claims, now)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn round_trip_within_window() {
        let now = Utc::now();
        let claims = LegacyClaims::new(UserId::new(), Role::Admin, now, Duration::minutes(10));
        let token = encode_legacy_token(SECRET, &claims).unwrap();
        assert_eq!(decode_legacy_token(SECRET, &token, now).unwrap(), claims);
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let now = Utc::now();
        let claims = LegacyClaims::new(UserId::new(), Role::Operator, now, Duration::minutes(10));
        let token = encode_legacy_token(b"other", &claims).unwrap();
        assert!(matches!(
            decode_legacy_token(SECRET, &token, now),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now() - Duration::hours(2);
        let claims = LegacyClaims::new(UserId::new(), Role::Operator, issued, Duration::hours(1));
        let token = encode_legacy_token(SECRET, &claims).unwrap();
        assert_eq!(
            decode_legacy_token(SECRET, &token, Utc::now()),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn future_issued_token_is_not_yet_valid() {
        let now = Utc::now();
        let claims = LegacyClaims::new(UserId::new(), Role::Operator, now + Duration::hours(1), Duration::hours(1));
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn inverted_window_is_invalid() {
        let now = Utc::now();
        let mut claims = LegacyClaims::new(UserId::new(), Role::Operator, now, Duration::minutes(1));
        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn token_without_exp_is_malformed() {
        #[derive(Serialize)]
        struct NoExp {
            id: UserId,
            iat: i64,
        }
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &NoExp { id: UserId::new(), iat: Utc::now().timestamp() },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            decode_legacy_token(SECRET, &token, Utc::now()),
            Err(TokenValidationError::Malformed(_))
        ));
    }
}
