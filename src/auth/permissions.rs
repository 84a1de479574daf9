/*!
 * # Permissions Module
 *
 * Capability names checked by the services. Capabilities are organized as
 * `resource:action`; a role granting `resource:*` holds every action on the
 * resource and `*` holds everything.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const APPROVE: &'static str = "approve";
    pub const COLLECT: &'static str = "collect";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const CUSTOMERS: &'static str = "customers";
    pub const SUPPLIERS: &'static str = "suppliers";
    pub const ITEMS: &'static str = "items";
    pub const QUOTATIONS: &'static str = "quotations";
    pub const PRODUCTION: &'static str = "production";
    pub const SALES: &'static str = "sales";
    pub const PAYMENTS: &'static str = "payments";
    pub const PURCHASES: &'static str = "purchases";
}

/// Builds a `resource:action` capability string.
pub fn capability(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Common permission string constants for compile-time safety
pub mod consts {
    pub const CUSTOMERS_READ: &str = "customers:read";
    pub const CUSTOMERS_CREATE: &str = "customers:create";
    pub const CUSTOMERS_UPDATE: &str = "customers:update";

    pub const SUPPLIERS_READ: &str = "suppliers:read";
    pub const SUPPLIERS_CREATE: &str = "suppliers:create";

    pub const ITEMS_READ: &str = "items:read";
    pub const ITEMS_CREATE: &str = "items:create";
    pub const ITEMS_UPDATE: &str = "items:update";

    pub const QUOTATIONS_READ: &str = "quotations:read";
    pub const QUOTATIONS_CREATE: &str = "quotations:create";
    pub const QUOTATIONS_UPDATE: &str = "quotations:update";
    pub const QUOTATIONS_APPROVE: &str = "quotations:approve";
    pub const QUOTATIONS_DELETE: &str = "quotations:delete";

    pub const PRODUCTION_READ: &str = "production:read";
    pub const PRODUCTION_CREATE: &str = "production:create";
    pub const PRODUCTION_UPDATE: &str = "production:update";
    pub const PRODUCTION_DELETE: &str = "production:delete";

    pub const SALES_READ: &str = "sales:read";
    pub const SALES_CREATE: &str = "sales:create";
    pub const SALES_UPDATE: &str = "sales:update";
    pub const SALES_DELETE: &str = "sales:delete";

    pub const PAYMENTS_READ: &str = "payments:read";
    pub const PAYMENTS_COLLECT: &str = "payments:collect";

    pub const PURCHASES_READ: &str = "purchases:read";
    pub const PURCHASES_CREATE: &str = "purchases:create";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_matches_constants() {
        assert_eq!(
            capability(Resources::QUOTATIONS, Actions::APPROVE),
            consts::QUOTATIONS_APPROVE
        );
        assert_eq!(
            capability(Resources::PAYMENTS, Actions::COLLECT),
            consts::PAYMENTS_COLLECT
        );
        assert_eq!(capability(Resources::SALES, Actions::ALL), "sales:*");
    }
}
