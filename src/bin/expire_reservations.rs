//! Scheduled job: release active stock reservations past their expiry
//!
//! Intended to run on a recurring schedule (e.g. cron every few minutes).
//! Reservations locked by in-flight requests are skipped and picked up on
//! the next run.

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_backend::{config::Config, services::ReservationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expire_reservations=info,storefront_backend=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Short-lived batch job: a small pool is enough
    let db_pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    let service = ReservationService::new(db_pool);
    let released = service.expire_reservations(Utc::now()).await?;

    tracing::info!("Expired reservations released: {released}");

    Ok(())
}
