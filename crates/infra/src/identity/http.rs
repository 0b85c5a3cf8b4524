//! Client for a hosted GoTrue-compatible identity service.
//!
//! User tokens are introspected with `GET /auth/v1/user`; account
//! administration goes through `/auth/v1/admin/users` authenticated with the
//! service key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::instrument;

use stockroom_auth::{AccountChanges, IdentityError, IdentityProvider, IdentityUser, NewAccount};
use stockroom_core::UserId;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct RemoteUser {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<Value>,
}

impl From<RemoteUser> for IdentityUser {
    fn from(remote: RemoteUser) -> Self {
        let name = remote
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
        IdentityUser {
            id: remote.id,
            email: remote.email,
            name,
        }
    }
}

impl HttpIdentityProvider {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Unavailable(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn admin(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(builder: RequestBuilder) -> Result<Response, IdentityError> {
        builder
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))
    }

    /// Map a non-success admin response to an error.
    async fn failure(resp: Response) -> IdentityError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => IdentityError::NotFound,
            s if s.is_client_error() => IdentityError::Rejected(format!("{}: {}", s.as_u16(), body)),
            s => IdentityError::Unavailable(format!("{}: {}", s.as_u16(), body)),
        }
    }
}

fn metadata(name: Option<&str>) -> Option<Value> {
    name.map(|n| json!({ "name": n }))
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[instrument(skip_all)]
    async fn user_for_token(&self, token: &str) -> Result<Option<IdentityUser>, IdentityError> {
        let resp = Self::send(
            self.client
                .get(self.url("/user"))
                .header("apikey", &self.service_key)
                .bearer_auth(token),
        )
        .await?;

        match resp.status() {
            s if s.is_success() => {
                let user: RemoteUser = resp
                    .json()
                    .await
                    .map_err(|e| IdentityError::Unavailable(format!("invalid user payload: {e}")))?;
                Ok(Some(user.into()))
            }
            s if s.is_client_error() => Ok(None),
            s => Err(IdentityError::Unavailable(format!("identity provider returned {}", s.as_u16()))),
        }
    }

    #[instrument(skip_all)]
    async fn create_account(&self, account: &NewAccount) -> Result<IdentityUser, IdentityError> {
        let mut body = json!({
            "email": account.email,
            "password": account.password,
            "email_confirm": true,
        });
        if let Some(meta) = metadata(account.name.as_deref()) {
            body["user_metadata"] = meta;
        }

        let resp = Self::send(self.admin(self.client.post(self.url("/admin/users"))).json(&body)).await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp).await);
        }
        let user: RemoteUser = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("invalid user payload: {e}")))?;
        Ok(user.into())
    }

    #[instrument(skip(self, changes), fields(user_id = %id))]
    async fn update_account(&self, id: UserId, changes: &AccountChanges) -> Result<(), IdentityError> {
        let mut body = Map::new();
        if let Some(email) = &changes.email {
            body.insert("email".to_string(), Value::from(email.as_str()));
        }
        if let Some(password) = &changes.password {
            body.insert("password".to_string(), Value::from(password.as_str()));
        }
        if let Some(meta) = metadata(changes.name.as_deref()) {
            body.insert("user_metadata".to_string(), meta);
        }

        let resp = Self::send(
            self.admin(self.client.put(self.url(&format!("/admin/users/{id}"))))
                .json(&Value::Object(body)),
        )
        .await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp).await);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn delete_account(&self, id: UserId) -> Result<(), IdentityError> {
        let resp = Self::send(self.admin(self.client.delete(self.url(&format!("/admin/users/{id}"))))).await?;
        if !resp.status().is_success() {
            return Err(Self::failure(resp).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use uuid::Uuid;

    use super::*;

    const KEY: &str = "service-key";

    #[derive(Clone, Default)]
    struct Fake {
        users: Arc<Mutex<HashMap<Uuid, Value>>>,
    }

    fn bearer(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string)
    }

    fn is_admin(headers: &HeaderMap) -> bool {
        headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(KEY) && bearer(headers).as_deref() == Some(KEY)
    }

    async fn current_user(State(fake): State<Fake>, headers: HeaderMap) -> Result<Json<Value>, AxumStatus> {
        let token = bearer(&headers).ok_or(AxumStatus::UNAUTHORIZED)?;
        let id = Uuid::parse_str(&token).map_err(|_| AxumStatus::UNAUTHORIZED)?;
        let users = fake.users.lock().unwrap();
        users.get(&id).cloned().map(Json).ok_or(AxumStatus::UNAUTHORIZED)
    }

    async fn create(
        State(fake): State<Fake>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, AxumStatus> {
        if !is_admin(&headers) {
            return Err(AxumStatus::UNAUTHORIZED);
        }
        if body["email"] == "taken@example.com" {
            return Err(AxumStatus::UNPROCESSABLE_ENTITY);
        }
        let id = Uuid::now_v7();
        let user = json!({
            "id": id,
            "email": body["email"],
            "user_metadata": body.get("user_metadata").cloned().unwrap_or(json!({})),
        });
        fake.users.lock().unwrap().insert(id, user.clone());
        Ok(Json(user))
    }

    async fn update(
        State(fake): State<Fake>,
        Path(id): Path<Uuid>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, AxumStatus> {
        if !is_admin(&headers) {
            return Err(AxumStatus::UNAUTHORIZED);
        }
        let mut users = fake.users.lock().unwrap();
        let user = users.get_mut(&id).ok_or(AxumStatus::NOT_FOUND)?;
        if let Some(email) = body.get("email") {
            user["email"] = email.clone();
        }
        if let Some(meta) = body.get("user_metadata") {
            user["user_metadata"] = meta.clone();
        }
        Ok(Json(user.clone()))
    }

    async fn remove(
        State(fake): State<Fake>,
        Path(id): Path<Uuid>,
        headers: HeaderMap,
    ) -> Result<Json<Value>, AxumStatus> {
        if !is_admin(&headers) {
            return Err(AxumStatus::UNAUTHORIZED);
        }
        fake.users
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| Json(json!({})))
            .ok_or(AxumStatus::NOT_FOUND)
    }

    async fn spawn_fake() -> (HttpIdentityProvider, Fake) {
        let fake = Fake::default();
        let app = Router::new()
            .route("/auth/v1/user", get(current_user))
            .route("/auth/v1/admin/users", post(create))
            .route("/auth/v1/admin/users/:id", put(update).delete(remove))
            .with_state(fake.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (HttpIdentityProvider::new(format!("http://{addr}/"), KEY).unwrap(), fake)
    }

    fn account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password: "hunter22".to_string(),
            name: Some("Dewi".to_string()),
        }
    }

    #[tokio::test]
    async fn create_then_introspect_token() {
        let (provider, _) = spawn_fake().await;
        let created = provider.create_account(&account("dewi@example.com")).await.unwrap();
        assert_eq!(created.name.as_deref(), Some("Dewi"));

        // The fake accepts the user id as that user's token.
        let user = provider
            .user_for_token(&created.id.to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user, created);

        assert_eq!(provider.user_for_token("garbage").await.unwrap(), None);
    }

    #[tokio::test]
    async fn client_errors_are_rejections() {
        let (provider, _) = spawn_fake().await;
        assert!(matches!(
            provider.create_account(&account("taken@example.com")).await,
            Err(IdentityError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn update_and_delete_map_missing_accounts() {
        let (provider, fake) = spawn_fake().await;
        let created = provider.create_account(&account("x@example.com")).await.unwrap();

        let changes = AccountChanges {
            email: Some("y@example.com".to_string()),
            ..AccountChanges::default()
        };
        provider.update_account(created.id, &changes).await.unwrap();
        let stored = fake.users.lock().unwrap()[created.id.as_uuid()].clone();
        assert_eq!(stored["email"], "y@example.com");

        provider.delete_account(created.id).await.unwrap();
        assert_eq!(provider.delete_account(created.id).await, Err(IdentityError::NotFound));
        assert_eq!(provider.update_account(created.id, &changes).await, Err(IdentityError::NotFound));
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        let provider = HttpIdentityProvider::new("http://127.0.0.1:1", KEY).unwrap();
        assert!(matches!(
            provider.user_for_token("t").await,
            Err(IdentityError::Unavailable(_))
        ));
    }
}
