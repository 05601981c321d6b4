//! Storefront Backend - inventory and stock accounting core
//!
//! Tracks on-hand and reserved stock per catalog variant, records signed
//! stock movements as an append-only audit trail, and manages short-lived
//! reservations that cart and order flows create, release, and convert.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;

pub use config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}
