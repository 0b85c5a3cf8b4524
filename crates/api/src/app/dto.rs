use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Json, Query};
use serde::{Deserialize, Deserializer, Serialize};

use stockroom_auth::{AccountChanges, NewAccount, Role};
use stockroom_core::{DomainError, FieldIssue, ItemId, UserId};
use stockroom_infra::profiles::ProfileChanges;
use stockroom_inventory::{
    Adjusted, Direction, ItemPatch, MAX_QUANTITY, NewItem, StockAdjustment, TransactionFilter,
    TransactionRecord, parse_effective_date,
};

use crate::app::errors::ApiError;

const MIN_PASSWORD_LEN: usize = 6;

// -------------------------
// Extraction helpers
// -------------------------

/// Unwrap a JSON body, turning malformed input into a 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|r| ApiError::validation("body", r.body_text()))
}

pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(v)| v)
        .map_err(|r| ApiError::validation("query", r.body_text()))
}

pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(ApiError::from)
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// -------------------------
// Items
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub code: String,
    pub name: String,
    pub stock: i64,
    #[serde(default)]
    pub shelf_location: Option<String>,
}

impl From<CreateItemRequest> for NewItem {
    fn from(r: CreateItemRequest) -> Self {
        NewItem {
            code: r.code,
            name: r.name,
            stock: r.stock,
            shelf_location: r.shelf_location,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub shelf_location: Option<Option<String>>,
}

impl From<UpdateItemRequest> for ItemPatch {
    fn from(r: UpdateItemRequest) -> Self {
        ItemPatch {
            code: r.code,
            name: r.name,
            stock: r.stock,
            shelf_location: r.shelf_location,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<i64>,
}

impl ThresholdQuery {
    pub fn resolve(&self, default: i64) -> Result<i64, ApiError> {
        match self.threshold {
            Some(t) if t < 0 => Err(ApiError::validation("threshold", "must be a non-negative integer")),
            Some(t) => Ok(t),
            None => Ok(default),
        }
    }
}

// -------------------------
// Transactions
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RecordTransactionRequest {
    pub item_id: String,
    pub quantity: i64,
    pub direction: String,
    pub effective_date: String,
}

impl RecordTransactionRequest {
    /// Parse every field, reporting all problems at once.
    pub fn into_adjustment(self, acting_user: UserId) -> Result<StockAdjustment, ApiError> {
        let mut issues: Vec<FieldIssue> = Vec::new();

        let item_id = self
            .item_id
            .parse::<ItemId>()
            .map_err(|_| issues.push(FieldIssue::new("item_id", "must be a UUID")))
            .ok();

        if self.quantity <= 0 {
            issues.push(FieldIssue::new("quantity", "must be a positive integer"));
        } else if self.quantity > MAX_QUANTITY {
            issues.push(FieldIssue::new("quantity", format!("must not exceed {MAX_QUANTITY}")));
        }

        let direction = self
            .direction
            .parse::<Direction>()
            .map_err(|e| issues.extend_from_slice(e.issues()))
            .ok();

        let effective_date = parse_effective_date(&self.effective_date)
            .map_err(|e| issues.extend_from_slice(e.issues()))
            .ok();

        match (item_id, direction, effective_date) {
            (Some(item_id), Some(direction), Some(effective_date)) if issues.is_empty() => Ok(StockAdjustment {
                item_id,
                quantity: self.quantity,
                direction,
                effective_date,
                acting_user,
            }),
            _ => Err(ApiError::Validation(issues)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub item_id: Option<String>,
    pub direction: Option<String>,
    pub limit: Option<i64>,
}

impl TransactionQuery {
    pub fn into_filter(self) -> Result<TransactionFilter, ApiError> {
        let item_id = self
            .item_id
            .as_deref()
            .map(|raw| raw.parse::<ItemId>())
            .transpose()
            .map_err(|_| ApiError::validation("item_id", "must be a UUID"))?;
        let direction = self
            .direction
            .as_deref()
            .map(Direction::from_str)
            .transpose()?;
        Ok(TransactionFilter::new(item_id, direction, self.limit))
    }
}

/// A record plus its derived signed quantity.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    #[serde(flatten)]
    pub record: TransactionRecord,
    pub signed_quantity: i64,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            signed_quantity: record.signed_quantity(),
            record,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecordedTransactionResponse {
    #[serde(flatten)]
    pub transaction: TransactionResponse,
    pub previous_stock: i64,
    pub new_stock: i64,
}

impl From<Adjusted> for RecordedTransactionResponse {
    fn from(a: Adjusted) -> Self {
        Self {
            transaction: a.record.into(),
            previous_stock: a.previous_stock,
            new_stock: a.new_stock,
        }
    }
}

// -------------------------
// Users
// -------------------------

fn looks_like_email(raw: &str) -> bool {
    let Some((local, domain)) = raw.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !raw.chars().any(char::is_whitespace)
}

fn parse_role(raw: &str, issues: &mut Vec<FieldIssue>) -> Option<Role> {
    let role = Role::parse(raw);
    if role.is_none() {
        issues.push(FieldIssue::new("role", "must be one of: admin, operator, user"));
    }
    role
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateUserRequest {
    pub fn validated(self) -> Result<(NewAccount, Role), ApiError> {
        let mut issues = Vec::new();
        let email = self.email.trim().to_string();
        if !looks_like_email(&email) {
            issues.push(FieldIssue::new("email", "must be a valid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            issues.push(FieldIssue::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        let role = parse_role(&self.role, &mut issues);

        match role {
            Some(role) if issues.is_empty() => Ok((
                NewAccount {
                    email,
                    password: self.password,
                    name: self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                },
                role,
            )),
            _ => Err(ApiError::Validation(issues)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    /// Split into identity-provider changes and profile changes.
    pub fn validated(self) -> Result<(AccountChanges, ProfileChanges), ApiError> {
        if self.email.is_none() && self.role.is_none() && self.name.is_none() && self.password.is_none() {
            return Err(ApiError::validation("body", "no fields to update"));
        }

        let mut issues = Vec::new();
        let email = self.email.map(|e| e.trim().to_string());
        if let Some(email) = &email {
            if !looks_like_email(email) {
                issues.push(FieldIssue::new("email", "must be a valid email address"));
            }
        }
        if let Some(password) = &self.password {
            if password.chars().count() < MIN_PASSWORD_LEN {
                issues.push(FieldIssue::new(
                    "password",
                    format!("must be at least {MIN_PASSWORD_LEN} characters"),
                ));
            }
        }
        let role = self.role.as_deref().and_then(|r| parse_role(r, &mut issues));
        if !issues.is_empty() {
            return Err(ApiError::Validation(issues));
        }

        Ok((
            AccountChanges {
                email: email.clone(),
                password: self.password,
                name: self.name,
            },
            ProfileChanges { email, role },
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record_request(item_id: &str, quantity: i64, direction: &str, date: &str) -> RecordTransactionRequest {
        RecordTransactionRequest {
            item_id: item_id.to_string(),
            quantity,
            direction: direction.to_string(),
            effective_date: date.to_string(),
        }
    }

    fn issue_fields(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation(issues) => issues.into_iter().map(|i| i.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_transaction_request_becomes_adjustment() {
        let id = ItemId::new();
        let user = UserId::new();
        let adj = record_request(&id.to_string(), 4, "out", "2024-03-01")
            .into_adjustment(user)
            .unwrap();
        assert_eq!(adj.item_id, id);
        assert_eq!(adj.direction, Direction::Out);
        assert_eq!(adj.effective_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(adj.acting_user, user);
    }

    #[test]
    fn every_bad_transaction_field_is_reported() {
        let err = record_request("nope", 0, "sideways", "tomorrow")
            .into_adjustment(UserId::new())
            .unwrap_err();
        assert_eq!(issue_fields(err), vec!["item_id", "quantity", "direction", "effective_date"]);
    }

    #[test]
    fn shelf_location_distinguishes_null_from_absent() {
        let absent: UpdateItemRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(absent.shelf_location, None);
        let cleared: UpdateItemRequest = serde_json::from_str(r#"{"shelf_location":null}"#).unwrap();
        assert_eq!(cleared.shelf_location, Some(None));
        let set: UpdateItemRequest = serde_json::from_str(r#"{"shelf_location":"C4"}"#).unwrap();
        assert_eq!(set.shelf_location, Some(Some("C4".to_string())));
    }

    #[test]
    fn negative_threshold_is_rejected() {
        assert_eq!(ThresholdQuery::default().resolve(10).unwrap(), 10);
        assert_eq!(ThresholdQuery { threshold: Some(3) }.resolve(10).unwrap(), 3);
        assert!(ThresholdQuery { threshold: Some(-1) }.resolve(10).is_err());
    }

    #[test]
    fn transaction_query_validates_filters() {
        let q = TransactionQuery {
            direction: Some("in".to_string()),
            limit: Some(5000),
            ..TransactionQuery::default()
        };
        let f = q.into_filter().unwrap();
        assert_eq!(f.direction, Some(Direction::In));
        assert_eq!(f.limit, 1000);

        let bad = TransactionQuery {
            item_id: Some("x".to_string()),
            ..TransactionQuery::default()
        };
        assert!(bad.into_filter().is_err());
    }

    #[test]
    fn create_user_rules() {
        let ok = CreateUserRequest {
            email: " ops@example.com ".to_string(),
            password: "secret".to_string(),
            role: "user".to_string(),
            name: None,
        };
        let (account, role) = ok.validated().unwrap();
        assert_eq!(account.email, "ops@example.com");
        assert_eq!(role, Role::Operator);

        let bad = CreateUserRequest {
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            role: "owner".to_string(),
            name: None,
        };
        assert_eq!(issue_fields(bad.validated().unwrap_err()), vec!["email", "password", "role"]);
    }

    #[test]
    fn empty_user_update_is_rejected() {
        assert_eq!(issue_fields(UpdateUserRequest::default().validated().unwrap_err()), vec!["body"]);
    }

    #[test]
    fn user_update_routes_fields() {
        let req = UpdateUserRequest {
            email: Some("new@example.com".to_string()),
            role: Some("admin".to_string()),
            ..UpdateUserRequest::default()
        };
        let (account, profile) = req.validated().unwrap();
        assert_eq!(account.email.as_deref(), Some("new@example.com"));
        assert_eq!(profile.role, Some(Role::Admin));
        assert!(account.password.is_none());
    }

    #[test]
    fn email_shapes() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a b@c.co"));
        assert!(!looks_like_email("a@@b.co"));
    }
}
