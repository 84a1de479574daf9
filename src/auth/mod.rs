//! Authorization seam consulted by the services before mutating or revealing data.

pub mod permissions;
pub mod rbac;

use crate::errors::ServiceError;
use std::collections::HashSet;
use std::fmt;

pub use permissions::consts;
pub use rbac::RbacService;

/// Capability checks for the acting user.
pub trait Authorizer: Send + Sync {
    /// Identifier recorded as creator, collector and approver.
    fn actor_id(&self) -> i64;

    fn has_capability(&self, capability: &str) -> bool;

    fn has_role(&self, role: &str) -> bool;

    /// Phone number used to match a customer-role actor to its customer record.
    fn phone(&self) -> Option<&str>;

    fn is_customer(&self) -> bool {
        self.has_role(rbac::CUSTOMER)
    }
}

impl fmt::Debug for dyn Authorizer + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("actor_id", &self.actor_id())
            .finish()
    }
}

/// Returns `Forbidden` unless the actor holds `capability`.
pub fn require(actor: &dyn Authorizer, capability: &str) -> Result<(), ServiceError> {
    if actor.has_capability(capability) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Actor {} lacks '{}'",
            actor.actor_id(),
            capability
        )))
    }
}

/// An authenticated user with roles from the static role table plus direct grants.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: i64,
    pub roles: Vec<String>,
    pub phone: Option<String>,
    permissions: HashSet<String>,
}

impl Actor {
    pub fn new(id: i64, roles: &[&str]) -> Self {
        let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
        let permissions = RbacService::new().get_permissions_for_roles(&roles);
        Self {
            id,
            roles,
            phone: None,
            permissions,
        }
    }

    /// A customer-portal user identified by phone.
    pub fn customer(id: i64, phone: impl Into<String>) -> Self {
        Self::new(id, &[rbac::CUSTOMER]).with_phone(phone)
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn grant(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }
}

impl Authorizer for Actor {
    fn actor_id(&self) -> i64 {
        self.id
    }

    fn has_capability(&self, capability: &str) -> bool {
        let rbac = RbacService::new();
        self.permissions
            .iter()
            .any(|granted| rbac.check_permission(granted, capability))
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn manager_holds_wildcard_capabilities() {
        let actor = Actor::new(1, &[rbac::MANAGER]);
        assert!(actor.has_capability(consts::SALES_DELETE));
        assert!(actor.has_capability(consts::QUOTATIONS_APPROVE));
        assert!(!actor.is_customer());
    }

    #[test]
    fn direct_grants_extend_roles() {
        let actor = Actor::new(2, &[rbac::STAFF]);
        assert_matches!(
            require(&actor, consts::PAYMENTS_COLLECT),
            Err(ServiceError::Forbidden(_))
        );

        let actor = actor.grant(consts::PAYMENTS_COLLECT);
        assert!(require(&actor, consts::PAYMENTS_COLLECT).is_ok());
    }

    #[test]
    fn customer_actor_carries_phone() {
        let actor = Actor::customer(3, "01700000000");
        assert!(actor.is_customer());
        assert_eq!(actor.phone(), Some("01700000000"));
        assert!(!actor.has_capability(consts::CUSTOMERS_READ));
    }
}
