use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::get,
};
use chrono::Utc;
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use stockroom_auth::Permission;
use stockroom_core::ItemId;
use stockroom_infra::StockChanged;
use stockroom_inventory::{ItemPatch, NewItem, low_stock};

use crate::app::dto::{self, CreateItemRequest, ThresholdQuery, UpdateItemRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require;
use crate::context::PrincipalContext;

const STOCK_UPDATED: &str = "stock-updated";

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/low-stock", get(list_low_stock))
        .route("/:id", get(get_item).put(update_item).delete(delete_item))
        .route("/:id/stream", get(stream_item))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::ITEMS_READ)?;
    let items = services.inventory.list_items().await?;
    Ok(Json(items).into_response())
}

pub async fn list_low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<ThresholdQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::ITEMS_READ)?;
    let threshold = dto::query_params(query)?.resolve(services.low_stock_threshold)?;

    let items = services.inventory.list_items().await?;
    Ok(Json(json!({
        "threshold": threshold,
        "items": low_stock(&items, threshold),
    }))
    .into_response())
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::ITEMS_READ)?;
    let id: ItemId = dto::parse_id(&id)?;

    match services.inventory.get_item(id).await? {
        Some(item) => Ok(Json(item).into_response()),
        None => Err(ApiError::NotFound("item")),
    }
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::ITEMS_WRITE)?;
    let new_item = NewItem::from(dto::json_body(body)?).validated()?;

    let item = services
        .inventory
        .create_item(new_item.into_item(ItemId::new(), Utc::now()))
        .await?;
    tracing::info!(item_id = %item.id, code = %item.code, user_id = %principal.user_id(), "item created");

    Ok((StatusCode::CREATED, Json(item)).into_response())
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::ITEMS_WRITE)?;
    let id: ItemId = dto::parse_id(&id)?;
    let patch = ItemPatch::from(dto::json_body(body)?).validated()?;

    let item = services
        .inventory
        .update_item(id, patch, Utc::now())
        .await
        .map_err(|e| ApiError::from(e).for_entity("item"))?;

    Ok(Json(item).into_response())
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require(&principal, &Permission::ITEMS_WRITE)?;
    let id: ItemId = dto::parse_id(&id)?;

    services
        .inventory
        .delete_item(id)
        .await
        .map_err(|e| ApiError::from(e).for_entity("item"))?;
    tracing::info!(item_id = %id, user_id = %principal.user_id(), "item deleted");

    Ok(Json(json!({ "message": "item deleted", "id": id })).into_response())
}

/// GET /items/:id/stream
///
/// Joins the item's room. The first event carries the current stock; every
/// accepted adjustment of this item follows as a `stock-updated` event.
/// Lagging listeners skip missed events.
pub async fn stream_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    require(&principal, &Permission::ITEMS_READ)?;
    let id: ItemId = dto::parse_id(&id)?;

    // Join before reading the snapshot so no update falls in between.
    let rx = services
        .hub
        .join(id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let item = services
        .inventory
        .get_item(id)
        .await?
        .ok_or(ApiError::NotFound("item"))?;

    let snapshot = stock_event(&StockChanged {
        item_id: item.id,
        stock: item.stock,
    });
    let updates = BroadcastStream::new(rx).filter_map(|msg| msg.ok().map(|change| stock_event(&change)));

    let stream = tokio_stream::once(snapshot)
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn stock_event(change: &StockChanged) -> SseEvent {
    let data = serde_json::to_string(change).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().event(STOCK_UPDATED).data(data)
}
