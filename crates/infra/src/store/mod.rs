//! Item catalog and stock ledger storage.
//!
//! Both backends implement [`InventoryStore`]. The in-memory backend is used
//! for development and tests; the Postgres backend when persistent stores are
//! enabled.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stockroom_core::{DomainError, ItemId, TransactionId};
use stockroom_inventory::{Adjusted, Item, ItemPatch, StockAdjustment, TransactionFilter, TransactionRecord};

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A business rule refused the operation (not found, conflict, insufficient stock, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub(crate) fn lock_poisoned() -> StoreError {
    StoreError::Backend("store lock poisoned".to_string())
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// All items, ordered by name.
    async fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    async fn find_item_by_code(&self, code: &str) -> Result<Option<Item>, StoreError>;

    /// Insert a new item. A duplicate `code` is a conflict.
    async fn create_item(&self, item: Item) -> Result<Item, StoreError>;

    /// Apply a validated patch to an existing item.
    async fn update_item(&self, id: ItemId, patch: ItemPatch, now: DateTime<Utc>) -> Result<Item, StoreError>;

    /// Remove an item. Items with transaction history cannot be removed.
    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError>;

    /// Atomically check, apply, and record one stock adjustment.
    ///
    /// The stock read, the stock write and the record insert happen as a
    /// single unit: concurrent adjustments of the same item are serialized
    /// and nothing is written when the adjustment is refused.
    async fn record_adjustment(
        &self,
        adjustment: StockAdjustment,
        record_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Adjusted, StoreError>;

    /// Transaction history, newest first.
    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, StoreError>;
}
