//! Stock adjustment pipeline.
//!
//! ```text
//! StockAdjustment
//!   ↓
//! 1. Validate (quantity bounds)
//!   ↓
//! 2. Store: lock item, apply, persist stock + record (one atomic unit)
//!   ↓
//! 3. Notify the item's room (best effort)
//! ```
//!
//! A notification failure is logged and never turns an accepted adjustment
//! into an error.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use stockroom_core::{DomainError, TransactionId};
use stockroom_inventory::{Adjusted, StockAdjustment};

use crate::realtime::{StockChanged, StockNotifier};
use crate::store::{InventoryStore, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Refused by a business rule; nothing was written.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("stock ledger storage failed: {0}")]
    Store(String),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Domain(e) => LedgerError::Domain(e),
            StoreError::Backend(msg) => LedgerError::Store(msg),
        }
    }
}

#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn InventoryStore>,
    notifier: Arc<dyn StockNotifier>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn InventoryStore>, notifier: Arc<dyn StockNotifier>) -> Self {
        Self { store, notifier }
    }

    #[instrument(
        skip(self, adjustment),
        fields(
            item_id = %adjustment.item_id,
            direction = %adjustment.direction,
            quantity = adjustment.quantity,
            user_id = %adjustment.acting_user
        ),
        err
    )]
    pub async fn adjust(&self, adjustment: StockAdjustment) -> Result<Adjusted, LedgerError> {
        adjustment.validate()?;

        let adjusted = self
            .store
            .record_adjustment(adjustment, TransactionId::new(), Utc::now())
            .await?;

        info!(
            transaction_id = %adjusted.record.id,
            previous_stock = adjusted.previous_stock,
            new_stock = adjusted.new_stock,
            "stock adjusted"
        );

        let change = StockChanged {
            item_id: adjusted.record.item_id,
            stock: adjusted.new_stock,
        };
        match self.notifier.notify(&change) {
            Ok(listeners) => debug!(listeners, "stock change published"),
            Err(e) => warn!(error = %e, "stock change not published"),
        }

        Ok(adjusted)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use stockroom_core::{ItemId, UserId};
    use stockroom_inventory::{Direction, NewItem, TransactionFilter};

    use super::*;
    use crate::realtime::{NotificationHub, NotifyError};
    use crate::store::InMemoryInventoryStore;

    struct BrokenNotifier;

    impl StockNotifier for BrokenNotifier {
        fn notify(&self, _: &StockChanged) -> Result<usize, NotifyError> {
            Err(NotifyError::Poisoned)
        }
    }

    async fn seeded(stock: i64) -> (Arc<InMemoryInventoryStore>, ItemId) {
        let store = Arc::new(InMemoryInventoryStore::new());
        let item = NewItem {
            code: "L-1".to_string(),
            name: "Ledger item".to_string(),
            stock,
            shelf_location: Some("Z9".to_string()),
        }
        .into_item(ItemId::new(), Utc::now());
        let id = item.id;
        store.create_item(item).await.unwrap();
        (store, id)
    }

    fn adjustment(item_id: ItemId, direction: Direction, quantity: i64) -> StockAdjustment {
        StockAdjustment {
            item_id,
            quantity,
            direction,
            effective_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            acting_user: UserId::new(),
        }
    }

    #[tokio::test]
    async fn accepted_adjustment_is_published_to_the_room() {
        let (store, id) = seeded(10).await;
        let hub = Arc::new(NotificationHub::default());
        let mut rx = hub.join(id).unwrap();
        let ledger = StockLedger::new(store, hub);

        let adjusted = ledger.adjust(adjustment(id, Direction::In, 3)).await.unwrap();
        assert_eq!(adjusted.new_stock, 13);
        assert_eq!(adjusted.record.signed_quantity(), 3);
        assert_eq!(rx.recv().await.unwrap(), StockChanged { item_id: id, stock: 13 });
    }

    #[tokio::test]
    async fn invalid_quantity_never_reaches_the_store() {
        let (store, id) = seeded(10).await;
        let ledger = StockLedger::new(store.clone(), Arc::new(NotificationHub::default()));

        let err = ledger.adjust(adjustment(id, Direction::Out, 0)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Domain(DomainError::Validation(_))));
        assert!(store.list_transactions(&TransactionFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refused_adjustment_publishes_nothing() {
        let (store, id) = seeded(2).await;
        let hub = Arc::new(NotificationHub::default());
        let mut rx = hub.join(id).unwrap();
        let ledger = StockLedger::new(store, hub);

        let err = ledger.adjust(adjustment(id, Direction::Out, 3)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientStock { available: 2, requested: 3 })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_adjustment() {
        let (store, id) = seeded(5).await;
        let ledger = StockLedger::new(store.clone(), Arc::new(BrokenNotifier));

        let adjusted = ledger.adjust(adjustment(id, Direction::Out, 5)).await.unwrap();
        assert_eq!(adjusted.new_stock, 0);
        assert_eq!(store.get_item(id).await.unwrap().unwrap().stock, 0);
    }
}
