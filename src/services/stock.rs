//! Stock ledger service: per-variant stock items and signed movements
//!
//! Every mutation locks the stock row (`SELECT ... FOR UPDATE`) before
//! reading `quantity`/`reserved`, so concurrent movements and reservations
//! against the same variant serialize on the row lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Stock ledger service owning stock items and their movement audit trail
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Stock movement types
///
/// Descriptive only: whether a movement adds or deducts stock is driven by
/// the sign of its quantity, not by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "movement_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Inbound,
    Outbound,
    Adjust,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Inbound => "inbound",
            MovementType::Outbound => "outbound",
            MovementType::Adjust => "adjust",
        }
    }
}

/// Stock item record: one row per catalog variant
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockItem {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub reserved: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Capacity remaining for new reservations or deductions
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved
    }
}

/// Immutable stock movement record (append-only audit log)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: String,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Input for applying a stock movement
#[derive(Debug, Deserialize)]
pub struct ApplyMovementInput {
    pub stock_item_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub reason: Option<String>,
    pub reference: Option<String>,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply a signed movement to a stock item
    ///
    /// Positive quantities are inbound/additions, negative are
    /// outbound/deductions. A zero quantity is a no-op and returns `None`;
    /// callers should treat it as already applied. Deductions may not
    /// exceed `quantity - reserved`.
    pub async fn apply_movement(
        &self,
        stock_item_id: Uuid,
        movement_type: MovementType,
        quantity: i32,
        reason: &str,
        reference: &str,
    ) -> AppResult<Option<StockMovement>> {
        if quantity == 0 {
            tracing::debug!("zero-quantity movement for stock item {stock_item_id}, skipping");
            return Ok(None);
        }

        let mut tx = self.db.begin().await?;

        let item = sqlx::query_as::<_, StockItem>(
            r#"
            SELECT id, variant_id, quantity, reserved, created_at, updated_at
            FROM stock_items
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(stock_item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        if quantity < 0 {
            let available = item.available();
            if -quantity > available {
                return Err(AppError::InsufficientAvailable(format!(
                    "cannot deduct {} from stock item {}: only {} available",
                    -quantity, item.id, available
                )));
            }
        }

        sqlx::query(
            "UPDATE stock_items SET quantity = quantity + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(quantity)
        .bind(item.id)
        .execute(&mut *tx)
        .await?;

        let movement = sqlx::query_as::<_, StockMovement>(
            r#"
            INSERT INTO stock_movements (stock_item_id, movement_type, quantity, reason, reference)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, stock_item_id, movement_type, quantity, reason, reference, created_at
            "#,
        )
        .bind(item.id)
        .bind(movement_type)
        .bind(quantity)
        .bind(reason)
        .bind(reference)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(movement))
    }

    /// Get a stock item by id
    pub async fn get_stock_item(&self, stock_item_id: Uuid) -> AppResult<StockItem> {
        sqlx::query_as::<_, StockItem>(
            r#"
            SELECT id, variant_id, quantity, reserved, created_at, updated_at
            FROM stock_items
            WHERE id = $1
            "#,
        )
        .bind(stock_item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))
    }

    /// Get the stock item tracking a variant, if one exists
    pub async fn get_stock_for_variant(&self, variant_id: Uuid) -> AppResult<Option<StockItem>> {
        let item = sqlx::query_as::<_, StockItem>(
            r#"
            SELECT id, variant_id, quantity, reserved, created_at, updated_at
            FROM stock_items
            WHERE variant_id = $1
            "#,
        )
        .bind(variant_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(item)
    }

    /// Capacity remaining for a stock item (0 when the item does not exist)
    pub async fn available_quantity(&self, stock_item_id: Uuid) -> AppResult<i32> {
        let available = sqlx::query_scalar::<_, i32>(
            "SELECT quantity - reserved FROM stock_items WHERE id = $1",
        )
        .bind(stock_item_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(available.unwrap_or(0))
    }

    /// List movements for a stock item, most recent first
    pub async fn list_movements(&self, stock_item_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let item_exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM stock_items WHERE id = $1)",
        )
        .bind(stock_item_id)
        .fetch_one(&self.db)
        .await?;

        if !item_exists {
            return Err(AppError::NotFound("Stock item".to_string()));
        }

        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, stock_item_id, movement_type, quantity, reason, reference, created_at
            FROM stock_movements
            WHERE stock_item_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(stock_item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(movements)
    }
}
