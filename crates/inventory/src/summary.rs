//! Dashboard aggregations over the item catalog.

use serde::Serialize;

use crate::Item;

/// Stock level at or below which an item counts as "low".
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

const TOP_BY_STOCK: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockSummary {
    pub total_items: usize,
    pub total_stock: i64,
    pub threshold: i64,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub top_by_stock: Vec<Item>,
}

pub fn summarize(items: &[Item], threshold: i64) -> StockSummary {
    let mut top: Vec<Item> = items.to_vec();
    top.sort_by(|a, b| b.stock.cmp(&a.stock).then_with(|| a.name.cmp(&b.name)));
    top.truncate(TOP_BY_STOCK);

    StockSummary {
        total_items: items.len(),
        total_stock: items.iter().fold(0i64, |acc, i| acc.saturating_add(i.stock)),
        threshold,
        low_stock_count: items.iter().filter(|i| i.stock <= threshold).count(),
        out_of_stock_count: items.iter().filter(|i| i.stock == 0).count(),
        top_by_stock: top,
    }
}

/// Items with `stock <= threshold`, lowest stock first.
pub fn low_stock(items: &[Item], threshold: i64) -> Vec<Item> {
    let mut low: Vec<Item> = items
        .iter()
        .filter(|i| i.stock <= threshold)
        .cloned()
        .collect();
    low.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    low
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use stockroom_core::ItemId;

    use super::*;

    fn item(name: &str, stock: i64) -> Item {
        let now = Utc::now();
        Item {
            id: ItemId::new(),
            code: format!("C-{name}"),
            name: name.to_string(),
            stock,
            shelf_location: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_counts_levels() {
        let items = vec![
            item("a", 0),
            item("b", 10),
            item("c", 11),
            item("d", 300),
        ];
        let s = summarize(&items, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(s.total_items, 4);
        assert_eq!(s.total_stock, 321);
        assert_eq!(s.low_stock_count, 2);
        assert_eq!(s.out_of_stock_count, 1);
        assert_eq!(s.top_by_stock[0].name, "d");
    }

    #[test]
    fn top_list_is_capped_and_tie_broken_by_name() {
        let items: Vec<Item> = ["f", "e", "d", "c", "b", "a"]
            .iter()
            .map(|n| item(n, 7))
            .collect();
        let s = summarize(&items, 0);
        let names: Vec<_> = s.top_by_stock.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn total_stock_saturates_instead_of_wrapping() {
        let items = vec![item("a", i64::MAX), item("b", 1)];
        assert_eq!(summarize(&items, 10).total_stock, i64::MAX);
    }

    #[test]
    fn empty_catalog_summarizes_to_zero() {
        let s = summarize(&[], 10);
        assert_eq!(s.total_items, 0);
        assert_eq!(s.total_stock, 0);
        assert!(s.top_by_stock.is_empty());
    }

    #[test]
    fn low_stock_is_sorted_ascending() {
        let items = vec![item("x", 9), item("y", 50), item("z", 1)];
        let low = low_stock(&items, 10);
        let names: Vec<_> = low.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["z", "x"]);
    }
}
