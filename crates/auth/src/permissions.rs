use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "items.read").
/// A special wildcard permission `"*"` can be used by policy layers to indicate
/// "allow all" without hardcoding every permission into a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const ITEMS_READ: Permission = Permission(Cow::Borrowed("items.read"));
    pub const ITEMS_WRITE: Permission = Permission(Cow::Borrowed("items.write"));
    pub const TRANSACTIONS_READ: Permission = Permission(Cow::Borrowed("transactions.read"));
    pub const TRANSACTIONS_RECORD: Permission = Permission(Cow::Borrowed("transactions.record"));
    pub const DASHBOARD_READ: Permission = Permission(Cow::Borrowed("dashboard.read"));
    pub const USERS_MANAGE: Permission = Permission(Cow::Borrowed("users.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
