use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockroom_core::{DomainError, ItemId, TransactionId};
use stockroom_inventory::{Adjusted, Item, ItemPatch, StockAdjustment, TransactionFilter, TransactionRecord};

use super::{InventoryStore, StoreError, lock_poisoned};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, Item>,
    /// Append-only, in commit order.
    transactions: Vec<TransactionRecord>,
}

impl State {
    fn code_taken(&self, code: &str, except: Option<ItemId>) -> bool {
        self.items
            .values()
            .any(|i| i.code == code && Some(i.id) != except)
    }
}

/// In-memory store for tests/dev.
///
/// Every mutation runs under one write lock, so adjustments are serialized.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let state = self.inner.read().map_err(|_| lock_poisoned())?;
        let mut items: Vec<Item> = state.items.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let state = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(state.items.get(&id).cloned())
    }

    async fn find_item_by_code(&self, code: &str) -> Result<Option<Item>, StoreError> {
        let state = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(state.items.values().find(|i| i.code == code).cloned())
    }

    async fn create_item(&self, item: Item) -> Result<Item, StoreError> {
        let mut state = self.inner.write().map_err(|_| lock_poisoned())?;
        if state.code_taken(&item.code, None) {
            return Err(DomainError::conflict(format!("item code '{}' already exists", item.code)).into());
        }
        state.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item(&self, id: ItemId, patch: ItemPatch, now: DateTime<Utc>) -> Result<Item, StoreError> {
        let mut state = self.inner.write().map_err(|_| lock_poisoned())?;
        if let Some(code) = &patch.code {
            if state.code_taken(code, Some(id)) {
                return Err(DomainError::conflict(format!("item code '{code}' already exists")).into());
            }
        }
        let item = state.items.get_mut(&id).ok_or(DomainError::NotFound)?;
        patch.apply(item, now);
        Ok(item.clone())
    }

    async fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        let mut state = self.inner.write().map_err(|_| lock_poisoned())?;
        if !state.items.contains_key(&id) {
            return Err(DomainError::NotFound.into());
        }
        if state.transactions.iter().any(|t| t.item_id == id) {
            return Err(DomainError::conflict("item has transaction history").into());
        }
        state.items.remove(&id);
        Ok(())
    }

    async fn record_adjustment(
        &self,
        adjustment: StockAdjustment,
        record_id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Adjusted, StoreError> {
        let mut state = self.inner.write().map_err(|_| lock_poisoned())?;

        let item = state
            .items
            .get_mut(&adjustment.item_id)
            .ok_or(DomainError::NotFound)?;
        let previous_stock = item.stock;
        let new_stock = adjustment.apply_to(previous_stock)?;
        item.stock = new_stock;
        item.updated_at = now;

        let record = adjustment.into_record(record_id, now);
        state.transactions.push(record.clone());

        Ok(Adjusted {
            record,
            previous_stock,
            new_stock,
        })
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, StoreError> {
        let state = self.inner.read().map_err(|_| lock_poisoned())?;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| filter.matches(t))
            .take(filter.limit)
            .cloned()
            .collect())
    }
}
