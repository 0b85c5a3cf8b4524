use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query, rejection::QueryRejection},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;

use stockroom_auth::Permission;
use stockroom_inventory::{StockSummary, TransactionFilter, summarize};

use crate::app::dto::{self, ThresholdQuery, TransactionResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

const RECENT_TRANSACTIONS: i64 = 5;

#[derive(Debug, Serialize)]
struct DashboardSummary {
    #[serde(flatten)]
    stock: StockSummary,
    recent_transactions: Vec<TransactionResponse>,
}

pub fn router() -> Router {
    Router::new().route("/summary", get(summary))
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<ThresholdQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::DASHBOARD_READ)?;
    let threshold = dto::query_params(query)?.resolve(services.low_stock_threshold)?;

    let items = services.inventory.list_items().await?;
    let recent = services
        .inventory
        .list_transactions(&TransactionFilter::new(None, None, Some(RECENT_TRANSACTIONS)))
        .await?;

    Ok(Json(DashboardSummary {
        stock: summarize(&items, threshold),
        recent_transactions: recent.into_iter().map(TransactionResponse::from).collect(),
    })
    .into_response())
}
