//! HTTP handlers for stock and reservation endpoints
//!
//! Thin wrappers over the stock and reservation services; all invariant
//! checks and locking happen inside the services.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::reservation::{
    ConvertReservationInput, CreateReservationInput, ReservationService, StockReservation,
};
use crate::services::stock::{ApplyMovementInput, StockItem, StockMovement, StockService};
use crate::AppState;

/// Stock item with its derived available capacity
#[derive(Debug, serde::Serialize)]
pub struct StockItemResponse {
    #[serde(flatten)]
    pub item: StockItem,
    pub available: i32,
}

impl From<StockItem> for StockItemResponse {
    fn from(item: StockItem) -> Self {
        let available = item.available();
        Self { item, available }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ConvertResponse {
    pub converted: bool,
}

/// Apply a signed stock movement
pub async fn apply_movement(
    State(state): State<AppState>,
    Json(input): Json<ApplyMovementInput>,
) -> AppResult<Json<Option<StockMovement>>> {
    let service = StockService::new(state.db);
    let movement = service
        .apply_movement(
            input.stock_item_id,
            input.movement_type,
            input.quantity,
            input.reason.as_deref().unwrap_or(""),
            input.reference.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(Json(movement))
}

/// Get a stock item with its available capacity
pub async fn get_stock_item(
    State(state): State<AppState>,
    Path(stock_item_id): Path<Uuid>,
) -> AppResult<Json<StockItemResponse>> {
    let service = StockService::new(state.db);
    let item = service.get_stock_item(stock_item_id).await?;
    Ok(Json(item.into()))
}

/// List movements for a stock item
pub async fn list_movements(
    State(state): State<AppState>,
    Path(stock_item_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = StockService::new(state.db);
    let movements = service.list_movements(stock_item_id).await?;
    Ok(Json(movements))
}

/// Get the stock tracked for a variant, if any
pub async fn get_variant_stock(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
) -> AppResult<Json<Option<StockItemResponse>>> {
    let service = StockService::new(state.db);
    let item = service.get_stock_for_variant(variant_id).await?;
    Ok(Json(item.map(Into::into)))
}

/// Create a reservation against a variant's available stock
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(input): Json<CreateReservationInput>,
) -> AppResult<Json<StockReservation>> {
    let service = ReservationService::new(state.db);
    let reservation = service
        .create_reservation(
            input.variant_id,
            input.quantity,
            &input.reference,
            input.expires_at,
        )
        .await?;
    Ok(Json(reservation))
}

/// Release a reservation (idempotent)
pub async fn release_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> AppResult<Json<ReleaseResponse>> {
    let service = ReservationService::new(state.db);
    let released = service.release_reservation(reservation_id).await?;
    Ok(Json(ReleaseResponse { released }))
}

/// Convert a reservation into a permanent stock deduction (idempotent)
pub async fn convert_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
    Json(input): Json<ConvertReservationInput>,
) -> AppResult<Json<ConvertResponse>> {
    let service = ReservationService::new(state.db);
    let converted = service
        .convert_reservation_to_order(
            reservation_id,
            input.reason.as_deref().unwrap_or("order"),
            input.reference.as_deref().unwrap_or(""),
        )
        .await?;
    Ok(Json(ConvertResponse { converted }))
}

/// Get a reservation by id
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> AppResult<Json<StockReservation>> {
    let service = ReservationService::new(state.db);
    let reservation = service.get_reservation(reservation_id).await?;
    Ok(Json(reservation))
}

/// List a variant's active reservations
pub async fn list_active_reservations(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockReservation>>> {
    let service = ReservationService::new(state.db);
    let reservations = service.list_active_for_variant(variant_id).await?;
    Ok(Json(reservations))
}
