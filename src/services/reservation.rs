//! Reservation service: short-lived holds against available stock
//!
//! A reservation is a temporary hold against a variant's available capacity
//! (`quantity - reserved`), not yet a permanent deduction. It is created
//! active and ends in exactly one of two terminal states: released (the
//! hold is returned to the pool) or converted (the hold becomes an outbound
//! movement at checkout). Terminal states are absorbing, so release and
//! convert are safe to retry or race.
//!
//! Reservation quantity is immutable. Callers that need a different
//! quantity (e.g. a cart line update) release the old reservation and
//! create a new one; the release's `reserved` decrement and audit must land
//! before the new reservation's availability check runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::stock::{MovementType, StockItem};

/// Reservation service managing the hold lifecycle for stock items
#[derive(Clone)]
pub struct ReservationService {
    db: PgPool,
}

/// Reservation lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    Active,
    Released,
    Converted,
}

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Active => "active",
            ReservationState::Released => "released",
            ReservationState::Converted => "converted",
        }
    }

    /// Released and converted are absorbing: no transition leaves them
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationState::Released | ReservationState::Converted)
    }
}

/// Stock reservation record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockReservation {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub reference: String,
    pub state: ReservationState,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a reservation
#[derive(Debug, Deserialize)]
pub struct CreateReservationInput {
    pub variant_id: Uuid,
    pub quantity: i32,
    pub reference: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for converting a reservation into an order deduction
#[derive(Debug, Deserialize)]
pub struct ConvertReservationInput {
    pub reason: Option<String>,
    pub reference: Option<String>,
}

impl ReservationService {
    /// Create a new ReservationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Reserve `quantity` units of a variant's available stock
    ///
    /// Lazily creates the variant's stock item (at zero) when absent, then
    /// locks it in the same transaction before checking availability. When
    /// the request exceeds `quantity - reserved` the whole transaction
    /// rolls back and nothing changes.
    pub async fn create_reservation(
        &self,
        variant_id: Uuid,
        quantity: i32,
        reference: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<StockReservation> {
        if quantity <= 0 {
            return Err(AppError::InvalidQuantity(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        // Upsert-then-lock: the row must be locked in this transaction,
        // whether it already existed or was just created.
        sqlx::query("INSERT INTO stock_items (variant_id) VALUES ($1) ON CONFLICT (variant_id) DO NOTHING")
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;

        let item = sqlx::query_as::<_, StockItem>(
            r#"
            SELECT id, variant_id, quantity, reserved, created_at, updated_at
            FROM stock_items
            WHERE variant_id = $1
            FOR UPDATE
            "#,
        )
        .bind(variant_id)
        .fetch_one(&mut *tx)
        .await?;

        let available = item.available();
        if quantity > available {
            return Err(AppError::InsufficientAvailable(format!(
                "cannot reserve {} of variant {}: only {} available",
                quantity, variant_id, available
            )));
        }

        sqlx::query(
            "UPDATE stock_items SET reserved = reserved + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(quantity)
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

        let reservation = sqlx::query_as::<_, StockReservation>(
            r#"
            INSERT INTO stock_reservations (variant_id, quantity, reference, state, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, variant_id, quantity, reference, state, expires_at, created_at, updated_at
            "#,
        )
        .bind(variant_id)
        .bind(quantity)
        .bind(reference)
        .bind(ReservationState::Active)
        .bind(expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(reservation)
    }

    /// Release a reservation, returning its hold to the available pool
    ///
    /// Idempotent: a missing or non-active reservation is a no-op and
    /// returns `false` without error.
    pub async fn release_reservation(&self, reservation_id: Uuid) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;
        let released = Self::release_in_tx(&mut tx, reservation_id, false).await?;
        tx.commit().await?;
        Ok(released)
    }

    /// Convert a reservation into a permanent outbound stock deduction
    ///
    /// The sole path from a hold to a real deduction: decrements both
    /// `reserved` and `quantity`, appends an outbound movement for the
    /// reservation's quantity, and marks the reservation converted.
    /// Idempotent no-op (`false`) when the reservation is missing or not
    /// active, so it can never double-deduct.
    pub async fn convert_reservation_to_order(
        &self,
        reservation_id: Uuid,
        reason: &str,
        reference: &str,
    ) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        let Some(reservation) = Self::lock_reservation(&mut tx, reservation_id, false).await?
        else {
            tracing::debug!("reservation {reservation_id} not found, skipping conversion");
            return Ok(false);
        };

        if reservation.state.is_terminal() {
            tracing::debug!(
                "reservation {reservation_id} already {}, skipping conversion",
                reservation.state.as_str()
            );
            return Ok(false);
        }

        let item = Self::lock_stock_for_variant(&mut tx, reservation.variant_id).await?;

        if reservation.quantity > item.quantity {
            return Err(AppError::InsufficientStockToFulfill(format!(
                "reservation {} needs {} but only {} on hand for variant {}",
                reservation.id, reservation.quantity, item.quantity, reservation.variant_id
            )));
        }

        let new_reserved = Self::floored_reserved(&item, &reservation);

        sqlx::query(
            "UPDATE stock_items SET reserved = $1, quantity = quantity - $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(new_reserved)
        .bind(reservation.quantity)
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (stock_item_id, movement_type, quantity, reason, reference)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id)
        .bind(MovementType::Outbound)
        .bind(-reservation.quantity)
        .bind(reason)
        .bind(reference)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE stock_reservations SET state = $1, updated_at = NOW() WHERE id = $2")
            .bind(ReservationState::Converted)
            .bind(reservation.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(true)
    }

    /// Release active reservations whose `expires_at` has passed
    ///
    /// Each candidate is handled in its own transaction with a skip-locked
    /// lock, so a reservation being released or converted by an in-flight
    /// request is skipped this pass and picked up on the next run. A
    /// failure on one reservation never aborts the rest of the sweep.
    pub async fn expire_reservations(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let candidates = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM stock_reservations
            WHERE state = $1 AND expires_at < $2
            ORDER BY expires_at
            "#,
        )
        .bind(ReservationState::Active)
        .bind(now)
        .fetch_all(&self.db)
        .await?;

        let mut released = 0u64;
        for reservation_id in candidates {
            let mut tx = match self.db.begin().await {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::error!("failed to begin expiry transaction: {e}");
                    continue;
                }
            };

            match Self::release_in_tx(&mut tx, reservation_id, true).await {
                Ok(true) => match tx.commit().await {
                    Ok(()) => released += 1,
                    Err(e) => {
                        tracing::error!("failed to commit expiry of reservation {reservation_id}: {e}");
                    }
                },
                // Locked by an in-flight request or already terminal;
                // the next scheduled run will pick it up if still due.
                Ok(false) => {
                    tracing::debug!("skipping reservation {reservation_id} this pass");
                }
                Err(e) => {
                    tracing::error!("failed to release expired reservation {reservation_id}: {e}");
                }
            }
        }

        Ok(released)
    }

    /// List a variant's active reservations, most recent first
    pub async fn list_active_for_variant(
        &self,
        variant_id: Uuid,
    ) -> AppResult<Vec<StockReservation>> {
        let reservations = sqlx::query_as::<_, StockReservation>(
            r#"
            SELECT id, variant_id, quantity, reference, state, expires_at, created_at, updated_at
            FROM stock_reservations
            WHERE variant_id = $1 AND state = $2
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(variant_id)
        .bind(ReservationState::Active)
        .fetch_all(&self.db)
        .await?;

        Ok(reservations)
    }

    /// Get a reservation by id
    pub async fn get_reservation(&self, reservation_id: Uuid) -> AppResult<StockReservation> {
        sqlx::query_as::<_, StockReservation>(
            r#"
            SELECT id, variant_id, quantity, reference, state, expires_at, created_at, updated_at
            FROM stock_reservations
            WHERE id = $1
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reservation".to_string()))
    }

    /// Lock a reservation row, optionally skipping it when already locked
    async fn lock_reservation(
        tx: &mut Transaction<'_, Postgres>,
        reservation_id: Uuid,
        skip_locked: bool,
    ) -> AppResult<Option<StockReservation>> {
        let sql = if skip_locked {
            r#"
            SELECT id, variant_id, quantity, reference, state, expires_at, created_at, updated_at
            FROM stock_reservations
            WHERE id = $1
            FOR UPDATE SKIP LOCKED
            "#
        } else {
            r#"
            SELECT id, variant_id, quantity, reference, state, expires_at, created_at, updated_at
            FROM stock_reservations
            WHERE id = $1
            FOR UPDATE
            "#
        };

        let reservation = sqlx::query_as::<_, StockReservation>(sql)
            .bind(reservation_id)
            .fetch_optional(&mut **tx)
            .await?;

        Ok(reservation)
    }

    /// Lock the stock row backing a reservation's variant
    async fn lock_stock_for_variant(
        tx: &mut Transaction<'_, Postgres>,
        variant_id: Uuid,
    ) -> AppResult<StockItem> {
        sqlx::query_as::<_, StockItem>(
            r#"
            SELECT id, variant_id, quantity, reserved, created_at, updated_at
            FROM stock_items
            WHERE variant_id = $1
            FOR UPDATE
            "#,
        )
        .bind(variant_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))
    }

    /// Decrement `reserved` by the reservation quantity, floored at zero
    ///
    /// `reserved` below the reservation quantity means the books were
    /// already inconsistent; the clamp keeps the operation total but is
    /// surfaced loudly instead of passing silently.
    fn floored_reserved(item: &StockItem, reservation: &StockReservation) -> i32 {
        if item.reserved < reservation.quantity {
            tracing::warn!(
                "reserved {} below reservation quantity {} for variant {}, clamping at zero",
                item.reserved,
                reservation.quantity,
                item.variant_id
            );
        }
        (item.reserved - reservation.quantity).max(0)
    }

    /// Shared release path for direct releases and the expiry sweep
    async fn release_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        reservation_id: Uuid,
        skip_locked: bool,
    ) -> AppResult<bool> {
        let Some(reservation) = Self::lock_reservation(tx, reservation_id, skip_locked).await?
        else {
            tracing::debug!("reservation {reservation_id} not found or locked, skipping release");
            return Ok(false);
        };

        if reservation.state.is_terminal() {
            tracing::debug!(
                "reservation {reservation_id} already {}, skipping release",
                reservation.state.as_str()
            );
            return Ok(false);
        }

        let item = Self::lock_stock_for_variant(tx, reservation.variant_id).await?;
        let new_reserved = Self::floored_reserved(&item, &reservation);

        sqlx::query("UPDATE stock_items SET reserved = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_reserved)
            .bind(item.id)
            .execute(&mut **tx)
            .await?;

        sqlx::query("UPDATE stock_reservations SET state = $1, updated_at = NOW() WHERE id = $2")
            .bind(ReservationState::Released)
            .bind(reservation.id)
            .execute(&mut **tx)
            .await?;

        Ok(true)
    }
}
