use serde::Serialize;

use stockroom_core::UserId;

use crate::Role;

/// Identity of an authenticated caller, resolved from a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            email: None,
            name: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
