use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::error;

use stockroom_auth::{VerifierChain, VerifyError};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub verifiers: VerifierChain,
}

/// Resolve the bearer credential into a [`PrincipalContext`].
///
/// Missing or rejected credentials are 401. When no verifier accepted and one
/// of them could not reach its backend, the request fails with 500.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?.to_string();

    let principal = match state.verifiers.verify(&token).await {
        Ok(p) => p,
        Err(VerifyError::Rejected(_)) => return Err(ApiError::Unauthorized),
        Err(VerifyError::Unavailable(reason)) => {
            error!(%reason, "credential verification unavailable");
            return Err(ApiError::Internal(reason));
        }
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ApiError::Unauthorized)?;

    let header = header.to_str().map_err(|_| ApiError::Unauthorized)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        assert_eq!(extract_bearer(&headers("Bearer abc ")).unwrap(), "abc");
    }

    #[test]
    fn other_schemes_and_blank_tokens_are_unauthorized() {
        assert!(matches!(extract_bearer(&HeaderMap::new()), Err(ApiError::Unauthorized)));
        assert!(matches!(extract_bearer(&headers("Basic abc")), Err(ApiError::Unauthorized)));
        assert!(matches!(extract_bearer(&headers("Bearer   ")), Err(ApiError::Unauthorized)));
    }
}
