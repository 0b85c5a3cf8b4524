//! Stock adjustments and their audit records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, ItemId, TransactionId, UserId};

use crate::item::MAX_STOCK;

/// Largest quantity accepted in a single adjustment.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Default number of records returned by a history query.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Upper bound for a history query's `limit`.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// Signed effect of `quantity` units in this direction.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            Direction::In => quantity,
            Direction::Out => -quantity,
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            _ => Err(DomainError::validation("direction", "must be one of: in, out")),
        }
    }
}

/// Parse an effective date given as `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_effective_date(raw: &str) -> DomainResult<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.date_naive())
        .map_err(|_| {
            DomainError::validation("effective_date", "must be a date (YYYY-MM-DD) or RFC 3339 timestamp")
        })
}

/// Request to move stock of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub item_id: ItemId,
    pub quantity: i64,
    pub direction: Direction,
    pub effective_date: NaiveDate,
    pub acting_user: UserId,
}

impl StockAdjustment {
    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("quantity", "must be a positive integer"));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(DomainError::validation(
                "quantity",
                format!("must not exceed {MAX_QUANTITY}"),
            ));
        }
        Ok(())
    }

    pub fn signed_delta(&self) -> i64 {
        self.direction.signed(self.quantity)
    }

    /// Stock count after applying this adjustment to `current`.
    ///
    /// Fails with [`DomainError::InsufficientStock`] when the result would be
    /// negative; callers must not persist anything in that case.
    pub fn apply_to(&self, current: i64) -> DomainResult<i64> {
        let new_stock = current
            .checked_add(self.signed_delta())
            .filter(|n| *n <= MAX_STOCK)
            .ok_or_else(|| {
                DomainError::validation("quantity", format!("stock count would exceed {MAX_STOCK}"))
            })?;

        if new_stock < 0 {
            return Err(DomainError::InsufficientStock {
                available: current,
                requested: self.quantity,
            });
        }
        Ok(new_stock)
    }

    pub fn into_record(self, id: TransactionId, created_at: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            id,
            item_id: self.item_id,
            quantity: self.quantity,
            direction: self.direction,
            effective_date: self.effective_date,
            user_id: self.acting_user,
            created_at,
        }
    }
}

/// Immutable audit entry of one accepted adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub item_id: ItemId,
    /// Always positive; the sign comes from `direction`.
    pub quantity: i64,
    pub direction: Direction,
    pub effective_date: NaiveDate,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn signed_quantity(&self) -> i64 {
        self.direction.signed(self.quantity)
    }
}

/// Result of an accepted adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjusted {
    pub record: TransactionRecord,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// Filter for the transaction history (newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFilter {
    pub item_id: Option<ItemId>,
    pub direction: Option<Direction>,
    pub limit: usize,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            item_id: None,
            direction: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl TransactionFilter {
    /// Build a filter, clamping `limit` into `1..=MAX_LIST_LIMIT`.
    pub fn new(item_id: Option<ItemId>, direction: Option<Direction>, limit: Option<i64>) -> Self {
        let limit = match limit {
            None => DEFAULT_LIST_LIMIT,
            Some(n) if n < 1 => 1,
            Some(n) => (n as u64).min(MAX_LIST_LIMIT as u64) as usize,
        };
        Self {
            item_id,
            direction,
            limit,
        }
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.item_id.is_none_or(|id| id == record.item_id)
            && self.direction.is_none_or(|d| d == record.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustment(direction: Direction, quantity: i64) -> StockAdjustment {
        StockAdjustment {
            item_id: ItemId::new(),
            quantity,
            direction,
            effective_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            acting_user: UserId::new(),
        }
    }

    #[test]
    fn out_of_exact_stock_reaches_zero() {
        assert_eq!(adjustment(Direction::Out, 5).apply_to(5), Ok(0));
    }

    #[test]
    fn out_past_zero_is_insufficient() {
        assert_eq!(
            adjustment(Direction::Out, 1).apply_to(0),
            Err(DomainError::InsufficientStock {
                available: 0,
                requested: 1
            })
        );
    }

    #[test]
    fn in_adds_to_stock() {
        let adj = adjustment(Direction::In, 3);
        assert_eq!(adj.signed_delta(), 3);
        assert_eq!(adj.apply_to(10), Ok(13));
    }

    #[test]
    fn non_positive_quantity_is_invalid() {
        assert!(adjustment(Direction::In, 0).validate().is_err());
        assert!(adjustment(Direction::Out, -2).validate().is_err());
        assert!(adjustment(Direction::In, MAX_QUANTITY + 1).validate().is_err());
        assert!(adjustment(Direction::In, MAX_QUANTITY).validate().is_ok());
    }

    #[test]
    fn overflow_is_rejected_not_wrapped() {
        let adj = adjustment(Direction::In, MAX_QUANTITY);
        assert!(matches!(adj.apply_to(i64::MAX), Err(DomainError::Validation(_))));
    }

    #[test]
    fn stock_in_cannot_pass_the_item_cap() {
        let adj = adjustment(Direction::In, 1);
        assert_eq!(adj.apply_to(MAX_STOCK - 1), Ok(MAX_STOCK));
        assert!(matches!(adj.apply_to(MAX_STOCK), Err(DomainError::Validation(_))));
    }

    #[test]
    fn record_keeps_inputs_and_signs_quantity() {
        let adj = adjustment(Direction::Out, 7);
        let user = adj.acting_user;
        let now = Utc::now();
        let rec = adj.into_record(TransactionId::new(), now);
        assert_eq!(rec.quantity, 7);
        assert_eq!(rec.signed_quantity(), -7);
        assert_eq!(rec.user_id, user);
        assert_eq!(rec.created_at, now);
    }

    #[test]
    fn effective_date_accepts_date_and_timestamp() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(parse_effective_date("2024-02-29"), Ok(d));
        assert_eq!(parse_effective_date("2024-02-29T23:10:00+07:00"), Ok(d));
        assert!(parse_effective_date("yesterday").is_err());
    }

    #[test]
    fn direction_parses_wire_names() {
        assert_eq!("in".parse::<Direction>(), Ok(Direction::In));
        assert_eq!("out".parse::<Direction>(), Ok(Direction::Out));
        assert!("masuk".parse::<Direction>().is_err());
    }

    #[test]
    fn filter_limit_is_clamped() {
        assert_eq!(TransactionFilter::new(None, None, None).limit, DEFAULT_LIST_LIMIT);
        assert_eq!(TransactionFilter::new(None, None, Some(0)).limit, 1);
        assert_eq!(TransactionFilter::new(None, None, Some(25)).limit, 25);
        assert_eq!(TransactionFilter::new(None, None, Some(50_000)).limit, MAX_LIST_LIMIT);
    }

    #[test]
    fn filter_matches_item_and_direction() {
        let rec = adjustment(Direction::In, 1).into_record(TransactionId::new(), Utc::now());
        assert!(TransactionFilter::default().matches(&rec));
        assert!(TransactionFilter::new(Some(rec.item_id), Some(Direction::In), None).matches(&rec));
        assert!(!TransactionFilter::new(Some(ItemId::new()), None, None).matches(&rec));
        assert!(!TransactionFilter::new(None, Some(Direction::Out), None).matches(&rec));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn direction() -> impl Strategy<Value = Direction> {
            prop_oneof![Just(Direction::In), Just(Direction::Out)]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: accepted adjustments never leave stock negative, and the
            /// signed record quantity equals the stock change.
            #[test]
            fn stock_never_negative(
                start in 0i64..1_000,
                moves in proptest::collection::vec((direction(), 1i64..200), 0..60)
            ) {
                let mut stock = start;
                for (dir, qty) in moves {
                    let adj = adjustment(dir, qty);
                    match adj.apply_to(stock) {
                        Ok(next) => {
                            let rec = adj.into_record(TransactionId::new(), Utc::now());
                            prop_assert_eq!(rec.signed_quantity(), next - stock);
                            stock = next;
                        }
                        Err(DomainError::InsufficientStock { available, requested }) => {
                            prop_assert_eq!(available, stock);
                            prop_assert!(requested > stock);
                            prop_assert_eq!(dir, Direction::Out);
                        }
                        Err(other) => prop_assert!(false, "unexpected error {:?}", other),
                    }
                    prop_assert!(stock >= 0);
                }
            }
        }
    }
}
