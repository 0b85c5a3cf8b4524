use axum::Json;
use serde_json::{Value, json};

/// Public liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
