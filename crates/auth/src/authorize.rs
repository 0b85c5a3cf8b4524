use thiserror::Error;

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Role → permission mapping.
///
/// Convention: "admin" grants all permissions.
pub fn permissions_for(role: Role) -> Vec<Permission> {
    match role {
        Role::Admin => vec![Permission::WILDCARD],
        Role::Operator => vec![
            Permission::ITEMS_READ,
            Permission::TRANSACTIONS_READ,
            Permission::TRANSACTIONS_RECORD,
            Permission::DASHBOARD_READ,
        ],
    }
}

/// Authorize a principal for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = permissions_for(principal.role)
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use stockroom_core::UserId;

    use super::*;

    fn principal(role: Role) -> Principal {
        Principal::new(UserId::new(), role)
    }

    #[test]
    fn admin_has_everything() {
        let admin = principal(Role::Admin);
        for perm in [
            Permission::ITEMS_WRITE,
            Permission::USERS_MANAGE,
            Permission::TRANSACTIONS_RECORD,
            Permission::new("anything.else"),
        ] {
            assert!(authorize(&admin, &perm).is_ok(), "admin denied {perm}");
        }
    }

    #[test]
    fn operator_records_but_does_not_manage() {
        let op = principal(Role::Operator);
        assert!(authorize(&op, &Permission::TRANSACTIONS_RECORD).is_ok());
        assert!(authorize(&op, &Permission::ITEMS_READ).is_ok());
        assert_eq!(
            authorize(&op, &Permission::ITEMS_WRITE),
            Err(AuthzError::Forbidden("items.write".to_string()))
        );
        assert!(authorize(&op, &Permission::USERS_MANAGE).is_err());
    }
}
