use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Only two roles exist. Role strings coming from tokens or the profile store
/// are mapped with [`Role::resolve`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Operator => "operator",
        }
    }

    /// Strict parse of a role name. `user` is the legacy name for `operator`.
    pub fn parse(name: &str) -> Option<Role> {
        match name.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "operator" | "user" => Some(Role::Operator),
            _ => None,
        }
    }

    /// Map a stored/claimed role to a [`Role`].
    ///
    /// Missing or unrecognized values fall back to `Operator`, the least
    /// privileged role, and are logged.
    pub fn resolve(raw: Option<&str>) -> Role {
        match raw {
            Some(name) => Role::parse(name).unwrap_or_else(|| {
                tracing::warn!(role = name, "unrecognized role; treating as operator");
                Role::Operator
            }),
            None => {
                tracing::warn!("no role on record; treating as operator");
                Role::Operator
            }
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
