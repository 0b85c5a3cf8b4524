use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use stockroom_auth::Permission;

use crate::app::dto::{self, RecordTransactionRequest, RecordedTransactionResponse, TransactionQuery, TransactionResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_transactions).post(record_transaction))
}

/// POST /transactions
///
/// Records one stock movement for the calling user. 409 `insufficient_stock`
/// when an `out` would take the item below zero; nothing is written then.
pub async fn record_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<RecordTransactionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::TRANSACTIONS_RECORD)?;
    let adjustment = dto::json_body(body)?.into_adjustment(principal.user_id())?;

    let adjusted = services
        .ledger
        .adjust(adjustment)
        .await
        .map_err(|e| ApiError::from(e).for_entity("item"))?;

    Ok((StatusCode::CREATED, Json(RecordedTransactionResponse::from(adjusted))).into_response())
}

/// GET /transactions?item_id=&direction=&limit=
pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<TransactionQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::TRANSACTIONS_READ)?;
    let filter = dto::query_params(query)?.into_filter()?;

    let records: Vec<TransactionResponse> = services
        .inventory
        .list_transactions(&filter)
        .await?
        .into_iter()
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(records).into_response())
}
