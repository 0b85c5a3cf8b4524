use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_core::{DomainError, DomainResult, IssueCollector, ItemId};

/// Largest stock count an item may hold.
pub const MAX_STOCK: i64 = 1_000_000_000_000;

/// Catalog item with a tracked stock count.
///
/// `stock` is only changed through [`crate::StockAdjustment`] or an explicit
/// admin edit; both keep it non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: ItemId,
    pub code: String,
    pub name: String,
    pub stock: i64,
    pub shelf_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub code: String,
    pub name: String,
    pub stock: i64,
    pub shelf_location: Option<String>,
}

impl NewItem {
    /// Trim text fields and reject empty/negative values.
    pub fn validated(self) -> DomainResult<Self> {
        let item = Self {
            code: self.code.trim().to_string(),
            name: self.name.trim().to_string(),
            stock: self.stock,
            shelf_location: normalize_location(self.shelf_location),
        };

        let mut issues = IssueCollector::new();
        issues.check(!item.code.is_empty(), "code", "must not be empty");
        issues.check(!item.name.is_empty(), "name", "must not be empty");
        check_stock(&mut issues, item.stock);
        issues.finish()?;

        Ok(item)
    }

    pub fn into_item(self, id: ItemId, now: DateTime<Utc>) -> Item {
        Item {
            id,
            code: self.code,
            name: self.name,
            stock: self.stock,
            shelf_location: self.shelf_location,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a catalog item.
///
/// `shelf_location: Some(None)` clears the location; `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub stock: Option<i64>,
    pub shelf_location: Option<Option<String>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.name.is_none()
            && self.stock.is_none()
            && self.shelf_location.is_none()
    }

    pub fn validated(self) -> DomainResult<Self> {
        if self.is_empty() {
            return Err(DomainError::validation("body", "no fields to update"));
        }

        let patch = Self {
            code: self.code.map(|c| c.trim().to_string()),
            name: self.name.map(|n| n.trim().to_string()),
            stock: self.stock,
            shelf_location: self.shelf_location.map(normalize_location),
        };

        let mut issues = IssueCollector::new();
        if let Some(code) = &patch.code {
            issues.check(!code.is_empty(), "code", "must not be empty");
        }
        if let Some(name) = &patch.name {
            issues.check(!name.is_empty(), "name", "must not be empty");
        }
        if let Some(stock) = patch.stock {
            check_stock(&mut issues, stock);
        }
        issues.finish()?;

        Ok(patch)
    }

    /// Apply an already-validated patch.
    pub fn apply(self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(code) = self.code {
            item.code = code;
        }
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(stock) = self.stock {
            item.stock = stock;
        }
        if let Some(location) = self.shelf_location {
            item.shelf_location = location;
        }
        item.updated_at = now;
    }
}

fn check_stock(issues: &mut IssueCollector, stock: i64) {
    if stock < 0 {
        issues.push("stock", "must be a non-negative integer");
    } else if stock > MAX_STOCK {
        issues.push("stock", format!("must not exceed {MAX_STOCK}"));
    }
}

fn normalize_location(location: Option<String>) -> Option<String> {
    location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}
