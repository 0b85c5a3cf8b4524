//! Infrastructure layer: configuration, storage backends, identity provider
//! client, live notifications.

pub mod config;
pub mod identity;
pub mod ledger;
pub mod profiles;
pub mod realtime;
pub mod seed;
pub mod store;

pub use config::{AppConfig, ConfigError, IdentityConfig};
pub use ledger::{LedgerError, StockLedger};
pub use realtime::{NotificationHub, StockChanged, StockNotifier};
pub use store::{InventoryStore, StoreError};
