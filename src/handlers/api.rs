//! JSON endpoints and the change stream. Reads are served from the store
//! mirror; writes go to the database and refresh the affected tables.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::Stream;
use serde::Deserialize;

use crate::{
    app::AppState,
    error::{AppError, Resource},
    inventory::{self, MovementOutcome},
    models::{
        Coordinate, HistoryEntry, InboundRequest, Location, MoveRequest, OutboundRequest,
        ProductWithLocations, ShelfConfig, ShelfDimensions,
    },
    realtime,
    repository::{self, HistoryFilter},
    shelf::{self, StockItem},
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub async fn health() -> &'static str {
    "OK"
}

pub async fn list_products(State(state): State<AppState>) -> Json<Vec<ProductWithLocations>> {
    Json(state.store.snapshot().await.products_with_locations())
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ProductWithLocations>, AppError> {
    state
        .store
        .snapshot()
        .await
        .product(&code)
        .map(Json)
        .ok_or(AppError::ProductNotFound(code))
}

pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<Location>> {
    Json(state.store.snapshot().await.locations)
}

pub async fn list_shelf_configs(State(state): State<AppState>) -> Json<Vec<ShelfConfig>> {
    Json(state.store.snapshot().await.shelf_configs.into_values().collect())
}

pub async fn put_shelf_config(
    State(state): State<AppState>,
    Path(column): Path<String>,
    Json(dimensions): Json<ShelfDimensions>,
) -> Result<Json<ShelfConfig>, AppError> {
    dimensions.validate()?;
    if column.trim().is_empty() {
        return Err(AppError::InvalidShelfConfig);
    }
    let config = repository::upsert_shelf_config(&state.db, &column, dimensions).await?;
    state.store.refresh(Resource::ShelfConfigs).await;
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    product: Option<String>,
    limit: Option<i64>,
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let filter = HistoryFilter {
        product_code: query.product,
        limit: query.limit.filter(|limit| *limit > 0),
    };
    Ok(Json(repository::fetch_history(&state.db, &filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    column: String,
    position: String,
    level: String,
}

pub async fn shelf_stock(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
) -> Json<Vec<StockItem>> {
    let at = Coordinate::new(query.column, query.position, query.level);
    let snapshot = state.store.snapshot().await;
    Json(shelf::stock_at(&snapshot.products_with_locations(), &at))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn shelf_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<ProductWithLocations>> {
    let products = state.store.snapshot().await.products_with_locations();
    Json(shelf::search(&products, &query.q).into_iter().cloned().collect())
}

pub async fn ship_outbound(
    State(state): State<AppState>,
    Json(request): Json<OutboundRequest>,
) -> Result<Json<MovementOutcome>, AppError> {
    let outcome = inventory::ship_outbound(&state.db, &request).await?;
    state.store.refresh_stock().await;
    Ok(Json(outcome))
}

pub async fn receive_inbound(
    State(state): State<AppState>,
    Json(request): Json<InboundRequest>,
) -> Result<(StatusCode, Json<MovementOutcome>), AppError> {
    let outcome = inventory::receive_inbound(&state.db, &request).await?;
    state.store.refresh_stock().await;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn move_stock(
    State(state): State<AppState>,
    Json(request): Json<MoveRequest>,
) -> Result<Json<MovementOutcome>, AppError> {
    let outcome = inventory::move_stock(&state.db, &request).await?;
    state.store.refresh_stock().await;
    Ok(Json(outcome))
}

/// Server-Sent Events: one event per table change, named after the table.
pub async fn changes(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.feed.subscribe();
    log::debug!("Change stream subscriber connected");
    Sse::new(realtime::event_stream(rx)).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
