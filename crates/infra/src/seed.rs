//! Demo catalog for fresh installations.

use chrono::Utc;
use tracing::info;

use stockroom_core::ItemId;
use stockroom_inventory::NewItem;

use crate::store::{InventoryStore, StoreError};

/// (code, name, stock, shelf)
const DEMO_ITEMS: [(&str, &str, i64, &str); 4] = [
    ("B-001", "Kardus Besar", 120, "A1"),
    ("B-002", "Lakban", 300, "A2"),
    ("B-003", "Pallet Kayu", 50, "B1"),
    ("B-004", "Bubble Wrap", 200, "A3"),
];

/// Insert the demo items whose codes are not present yet. Returns how many
/// were inserted.
pub async fn seed_demo_items(store: &dyn InventoryStore) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for (code, name, stock, shelf) in DEMO_ITEMS {
        if store.find_item_by_code(code).await?.is_some() {
            continue;
        }
        let item = NewItem {
            code: code.to_string(),
            name: name.to_string(),
            stock,
            shelf_location: Some(shelf.to_string()),
        }
        .into_item(ItemId::new(), Utc::now());
        store.create_item(item).await?;
        inserted += 1;
    }
    info!(inserted, "demo items seeded");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryInventoryStore;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = InMemoryInventoryStore::new();
        assert_eq!(seed_demo_items(&store).await.unwrap(), 4);
        assert_eq!(seed_demo_items(&store).await.unwrap(), 0);

        let lakban = store.find_item_by_code("B-002").await.unwrap().unwrap();
        assert_eq!(lakban.stock, 300);
        assert_eq!(lakban.shelf_location.as_deref(), Some("A2"));
    }
}
