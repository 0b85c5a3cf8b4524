//! Inventory domain module.
//!
//! This crate contains business rules for inventory, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod item;
pub mod summary;
pub mod transaction;

pub use item::{Item, ItemPatch, MAX_STOCK, NewItem};
pub use summary::{DEFAULT_LOW_STOCK_THRESHOLD, StockSummary, low_stock, summarize};
pub use transaction::{
    Adjusted, DEFAULT_LIST_LIMIT, Direction, MAX_LIST_LIMIT, MAX_QUANTITY, StockAdjustment,
    TransactionFilter, TransactionRecord, parse_effective_date,
};
