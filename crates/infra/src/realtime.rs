//! Per-item notification rooms for live stock updates.
//!
//! Each item with at least one listener has its own lossy broadcast channel.
//! Publishing never blocks and never fails because of slow or absent
//! listeners.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use stockroom_core::ItemId;

/// Buffered messages per room before slow listeners start lagging.
pub const ROOM_CAPACITY: usize = 64;

/// Payload of a `stock-updated` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockChanged {
    pub item_id: ItemId,
    pub stock: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification hub unavailable")]
    Poisoned,
}

/// Sink for stock change notifications.
pub trait StockNotifier: Send + Sync {
    /// Deliver to the item's room. Returns the number of listeners reached.
    fn notify(&self, change: &StockChanged) -> Result<usize, NotifyError>;
}

#[derive(Debug)]
pub struct NotificationHub {
    rooms: Mutex<HashMap<ItemId, broadcast::Sender<StockChanged>>>,
    capacity: usize,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(ROOM_CAPACITY)
    }
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Join the room of `item`, creating it if needed. Rooms nobody listens
    /// to any more are dropped on the way.
    pub fn join(&self, item: ItemId) -> Result<broadcast::Receiver<StockChanged>, NotifyError> {
        let mut rooms = self.rooms.lock().map_err(|_| NotifyError::Poisoned)?;
        rooms.retain(|_, tx| tx.receiver_count() > 0);
        let rx = match rooms.get(&item) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(self.capacity);
                rooms.insert(item, tx);
                rx
            }
        };
        Ok(rx)
    }

    /// Number of rooms currently held open.
    pub fn room_count(&self) -> usize {
        self.rooms.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl StockNotifier for NotificationHub {
    fn notify(&self, change: &StockChanged) -> Result<usize, NotifyError> {
        let mut rooms = self.rooms.lock().map_err(|_| NotifyError::Poisoned)?;
        let Some(tx) = rooms.get(&change.item_id) else {
            return Ok(0);
        };
        match tx.send(change.clone()) {
            Ok(reached) => Ok(reached),
            Err(_) => {
                // Every listener has left.
                rooms.remove(&change.item_id);
                Ok(0)
            }
        }
    }
}
