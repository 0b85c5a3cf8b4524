//! Postgres-backed inventory store.
//!
//! ## Atomic adjustments
//!
//! `record_adjustment` runs in one SQL transaction: the item row is locked with
//! `SELECT ... FOR UPDATE`, the new stock is computed by
//! [`StockAdjustment::apply_to`], then the stock update and the ledger insert
//! are committed together. A refused adjustment rolls back explicitly.
//!
//! ## Error mapping
//!
//! | PostgreSQL code | StoreError |
//! |-----------------|------------|
//! | `23505` unique violation | `Domain(Conflict)` (duplicate item code) |
//! | `23503` foreign key violation | `Domain(Conflict)` (item has history) |
//! | anything else | `Backend` |

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_core::{DomainError, ItemId, TransactionId, UserId};
use stockroom_inventory::{
    Adjusted, Direction, Item, ItemPatch, StockAdjustment, TransactionFilter, TransactionRecord,
};

use super::{InventoryStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const ITEM_COLUMNS: &str = "id, code, name, stock, shelf_location, created_at, updated_at";
const TRANSACTION_COLUMNS: &str = "id, item_id, quantity, direction, effective_date, user_id, created_at";

/// Create tables and indexes if they do not exist yet.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_item(
        tx: &mut Transaction<'_, Postgres>,
        id: ItemId,
    ) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self))]
    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY name, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;
        rows.iter().map(item_from_row).collect()
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn find_item_by_code(&self, code: &str) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_item_by_code", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, code = %item.code))]
    async fn create_item(&self, item: Item) -> Result<Item, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(item.id.as_uuid())
        .bind(&item.code)
        .bind(&item.name)
        .bind(item.stock)
        .bind(&item.shelf_location)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_item", e))?;
        Ok(item)
    }

    #[instrument(skip(self, patch), fields(item_id = %id))]
    async fn update_item(&self, id: ItemId, patch: ItemPatch, now: DateTime<Utc>) -> Result<Item, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(mut item) = Self::lock_item(&mut tx, id).await? else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::NotFound.into());
        };
        patch.apply(&mut item, now);

        sqlx::query(
            "UPDATE items SET code = $2, name = $3, stock = $4, shelf_location = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(item.id.as_uuid())
        .bind(&item.code)
        .bind(&item.name)
        .bind(item.stock)
        .bind(&item.shelf_location)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(item)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound.into());
        }
        Ok(())
    }

    #[instrument(
        skip(self, adjustment),
        fields(item_id = %adjustment.item_id, direction = %adjustment.direction, quantity = adjustment.quantity)
    )]
    async fn record_adjustment(
        &self,
        adjustment: StockAdjustment,
        record_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Adjusted, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let Some(item) = Self::lock_item(&mut tx, adjustment.item_id).await? else {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(DomainError::NotFound.into());
        };

        let previous_stock = item.stock;
        let new_stock = match adjustment.apply_to(previous_stock) {
            Ok(n) => n,
            Err(e) => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e.into());
            }
        };

        sqlx::query("UPDATE items SET stock = $2, updated_at = $3 WHERE id = $1")
            .bind(item.id.as_uuid())
            .bind(new_stock)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_stock", e))?;

        let record = adjustment.into_record(record_id, now);
        sqlx::query(&format!(
            "INSERT INTO stock_transactions ({TRANSACTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(record.id.as_uuid())
        .bind(record.item_id.as_uuid())
        .bind(record.quantity)
        .bind(record.direction.as_str())
        .bind(record.effective_date)
        .bind(record.user_id.as_uuid())
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(Adjusted {
            record,
            previous_stock,
            new_stock,
        })
    }

    #[instrument(skip(self), fields(limit = filter.limit))]
    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, StoreError> {
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions \
             WHERE ($1::uuid IS NULL OR item_id = $1) AND ($2::text IS NULL OR direction = $2) \
             ORDER BY created_at DESC, id DESC LIMIT $3"
        ))
        .bind(filter.item_id.map(Uuid::from))
        .bind(filter.direction.map(|d| d.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;
        rows.iter().map(transaction_from_row).collect()
    }
}

fn item_from_row(row: &PgRow) -> Result<Item, StoreError> {
    let decode = |e| map_sqlx_error("decode_item", e);
    Ok(Item {
        id: ItemId::from_uuid(row.try_get("id").map_err(decode)?),
        code: row.try_get("code").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        stock: row.try_get("stock").map_err(decode)?,
        shelf_location: row.try_get("shelf_location").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<TransactionRecord, StoreError> {
    let decode = |e| map_sqlx_error("decode_transaction", e);
    let direction: String = row.try_get("direction").map_err(decode)?;
    Ok(TransactionRecord {
        id: TransactionId::from_uuid(row.try_get("id").map_err(decode)?),
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(decode)?),
        quantity: row.try_get("quantity").map_err(decode)?,
        direction: Direction::from_str(&direction)
            .map_err(|_| StoreError::Backend(format!("unknown direction '{direction}' in ledger")))?,
        effective_date: row.try_get("effective_date").map_err(decode)?,
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            match conflict_message(db_err.code().as_deref(), db_err.constraint()) {
                Some(message) => DomainError::conflict(message).into(),
                None => StoreError::Backend(format!("database error in {}: {}", operation, db_err.message())),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        other => StoreError::Backend(format!("{} failed: {}", operation, other)),
    }
}

/// Client-facing message for a constraint violation, keyed on the violated
/// constraint so each table reports its own conflict.
fn conflict_message(code: Option<&str>, constraint: Option<&str>) -> Option<&'static str> {
    match (code?, constraint) {
        ("23505", Some("items_code_key")) => Some("item code already exists"),
        ("23503", Some("stock_transactions_item_id_fkey")) => Some("item has transaction history"),
        ("23505", Some("profiles_pkey")) => Some("profile already exists"),
        ("23505", _) => Some("record already exists"),
        ("23503", _) => Some("record is still referenced"),
        _ => None,
    }
}
