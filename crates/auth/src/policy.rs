//! The shop's role policy.

use storeledger_core::TenantId;

use crate::{Permission, Role, TenantMembership};

/// Read permissions every staff role holds.
const READ_ALL: &[&str] = &[
    "customers.read",
    "products.read",
    "inventory.read",
    "invoices.read",
    "returns.read",
    "closing.read",
];

/// Permissions granted by a role; unknown roles grant nothing.
pub fn role_permissions(role: &Role) -> Vec<Permission> {
    let names: Vec<&'static str> = match role.as_str() {
        Role::ADMIN => vec!["*"],
        Role::MANAGER => vec![
            "customers.*",
            "products.*",
            "inventory.*",
            "invoices.*",
            "pos.*",
            "returns.*",
            "closing.*",
        ],
        Role::CASHIER => {
            let mut names = vec![
                "pos.checkout",
                "customers.register",
                "invoices.pay",
                "returns.record",
            ];
            names.extend_from_slice(READ_ALL);
            names
        }
        _ => Vec::new(),
    };
    names.into_iter().map(Permission::new).collect()
}

/// Membership in `tenant_id` with the union of the roles' permissions.
pub fn membership_for(tenant_id: TenantId, roles: &[Role]) -> TenantMembership {
    let mut permissions: Vec<Permission> = Vec::new();
    for role in roles {
        for p in role_permissions(role) {
            if !permissions.contains(&p) {
                permissions.push(p);
            }
        }
    }
    TenantMembership {
        tenant_id,
        roles: roles.to_vec(),
        permissions,
    }
}
