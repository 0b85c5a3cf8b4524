//! Account administration.
//!
//! Credentials live in the identity provider; the role lives in the profile
//! store. Writes go to the identity provider first.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use stockroom_auth::{IdentityError, Permission};
use stockroom_core::UserId;

use crate::app::dto::{self, CreateUserRequest, UpdateUserRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

/// GET /users/me (any authenticated caller)
pub async fn me(Extension(principal): Extension<PrincipalContext>) -> Response {
    Json(json!({ "user": principal.principal() })).into_response()
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::USERS_MANAGE)?;
    Ok(Json(services.profiles.list().await?).into_response())
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let (account, role) = dto::json_body(body)?.validated()?;

    let user = services.identity.create_account(&account).await?;
    let profile = match services
        .profiles
        .upsert(user.id, &account.email, role, Utc::now())
        .await
    {
        Ok(profile) => profile,
        Err(err) => {
            // Undo the account so it is not left without a role.
            if let Err(undo) = services.identity.delete_account(user.id).await {
                warn!(user_id = %user.id, error = %undo, "account left without a profile");
            }
            return Err(err.into());
        }
    };
    info!(user_id = %user.id, %role, by = %principal.user_id(), "user created");

    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let id: UserId = dto::parse_id(&id)?;

    match services.profiles.get(id).await? {
        Some(profile) => Ok(Json(profile).into_response()),
        None => Err(ApiError::NotFound("user")),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let id: UserId = dto::parse_id(&id)?;
    let (account_changes, profile_changes) = dto::json_body(body)?.validated()?;

    if services.profiles.get(id).await?.is_none() {
        return Err(ApiError::NotFound("user"));
    }

    if !account_changes.is_empty() {
        services.identity.update_account(id, &account_changes).await?;
    }

    let profile = if profile_changes.is_empty() {
        services.profiles.get(id).await?
    } else {
        services.profiles.update(id, profile_changes, Utc::now()).await?
    };
    info!(user_id = %id, by = %principal.user_id(), "user updated");

    profile
        .map(|p| Json(p).into_response())
        .ok_or(ApiError::NotFound("user"))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::USERS_MANAGE)?;
    let id: UserId = dto::parse_id(&id)?;

    let account_found = match services.identity.delete_account(id).await {
        Ok(()) => true,
        Err(IdentityError::NotFound) => {
            warn!(user_id = %id, "account missing in identity provider; removing profile only");
            false
        }
        Err(e) => return Err(e.into()),
    };
    let profile_found = services.profiles.delete(id).await?;

    if !account_found && !profile_found {
        return Err(ApiError::NotFound("user"));
    }
    info!(user_id = %id, by = %principal.user_id(), "user deleted");

    Ok(StatusCode::NO_CONTENT.into_response())
}
