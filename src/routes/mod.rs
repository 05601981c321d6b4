//! Route definitions for the Storefront Backend

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Inventory: stock ledger and reservations
        .nest("/inventory", inventory_routes())
}

/// Inventory routes: stock items, movements, reservations
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::inventory_health))
        .route("/movements", post(handlers::apply_movement))
        .route("/stock-items/:stock_item_id", get(handlers::get_stock_item))
        .route(
            "/stock-items/:stock_item_id/movements",
            get(handlers::list_movements),
        )
        .route("/variants/:variant_id/stock", get(handlers::get_variant_stock))
        .route(
            "/variants/:variant_id/reservations",
            get(handlers::list_active_reservations),
        )
        .route("/reservations", post(handlers::create_reservation))
        .route("/reservations/:reservation_id", get(handlers::get_reservation))
        .route(
            "/reservations/:reservation_id/release",
            post(handlers::release_reservation),
        )
        .route(
            "/reservations/:reservation_id/convert",
            post(handlers::convert_reservation),
        )
}
