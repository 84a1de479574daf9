/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Static role table. Role assignment and persistence live outside this
 * crate; only the role to capability mapping is defined here.
 */

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use tracing::warn;

pub const SUPER_ADMIN: &str = "super_admin";
pub const MANAGER: &str = "manager";
pub const MARKETING_OFFICER: &str = "marketing_officer";
pub const STAFF: &str = "staff";
pub const CUSTOMER: &str = "customer";

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

fn role(name: &str, description: &str, permissions: &[&str]) -> Role {
    Role {
        name: name.to_string(),
        description: description.to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let roles = vec![
            role(SUPER_ADMIN, "Full access", &["*"]),
            role(
                MANAGER,
                "Runs sales, production and purchasing",
                &[
                    "customers:*",
                    "suppliers:*",
                    "items:*",
                    "quotations:*",
                    "production:*",
                    "sales:*",
                    "payments:*",
                    "purchases:*",
                ],
            ),
            role(
                MARKETING_OFFICER,
                "Handles customers and quotations",
                &[
                    "customers:read",
                    "customers:create",
                    "customers:update",
                    "items:read",
                    "quotations:read",
                    "quotations:create",
                    "quotations:update",
                    "production:read",
                    "sales:read",
                    "payments:read",
                    "payments:collect",
                ],
            ),
            role(
                STAFF,
                "Shop floor staff",
                &[
                    "items:read",
                    "quotations:read",
                    "production:read",
                    "production:create",
                    "production:update",
                    "sales:read",
                    "purchases:read",
                ],
            ),
            role(
                CUSTOMER,
                "Customer portal access to own documents",
                &[
                    "quotations:read",
                    "quotations:create",
                    "quotations:update",
                    "sales:read",
                ],
            ),
        ];

        roles.into_iter().map(|r| (r.name.clone(), r)).collect()
    };
}

/// Lookup over the static role table.
#[derive(Debug, Clone, Copy, Default)]
pub struct RbacService;

impl RbacService {
    pub fn new() -> Self {
        Self
    }

    pub fn get_role(&self, role_name: &str) -> Option<&'static Role> {
        ROLES.get(role_name)
    }

    /// Union of the permissions of every known role in `role_names`.
    pub fn get_permissions_for_roles(&self, role_names: &[String]) -> HashSet<String> {
        let mut permissions = HashSet::new();
        for name in role_names {
            match self.get_role(name) {
                Some(role) => permissions.extend(role.permissions.iter().cloned()),
                None => warn!("Unknown role '{}' ignored", name),
            }
        }
        permissions
    }

    /// Checks a granted permission against a required one, honouring
    /// `resource:*` and `*` wildcards.
    pub fn check_permission(&self, user_permission: &str, required_permission: &str) -> bool {
        if user_permission == required_permission || user_permission == "*" {
            return true;
        }

        match user_permission.strip_suffix(":*") {
            Some(resource) => required_permission
                .split_once(':')
                .map(|(required_resource, _)| required_resource == resource)
                .unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sales:create", "sales:create", true)]
    #[case("sales:*", "sales:delete", true)]
    #[case("sales:*", "salesforce:read", false)]
    #[case("*", "payments:collect", true)]
    #[case("quotations:read", "quotations:update", false)]
    fn permission_matching(#[case] granted: &str, #[case] required: &str, #[case] expected: bool) {
        assert_eq!(RbacService::new().check_permission(granted, required), expected);
    }

    #[test]
    fn customer_role_cannot_list_customers() {
        let perms = RbacService::new().get_permissions_for_roles(&[CUSTOMER.to_string()]);
        assert!(!perms.contains("customers:read"));
        assert!(perms.contains("quotations:create"));
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let perms = RbacService::new().get_permissions_for_roles(&["intern".to_string()]);
        assert!(perms.is_empty());
    }
}
