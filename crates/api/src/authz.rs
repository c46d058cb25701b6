//! Permission check at the request boundary, before any workflow runs.

use storeledger_auth::{AuthzError, CommandAuthorization, Permission, Principal, authorize};

use crate::app::errors::ApiError;
use crate::context::{PrincipalContext, TenantContext};

/// A single named permission an endpoint needs.
#[derive(Debug, Clone)]
pub struct Requires([Permission; 1]);

impl Requires {
    pub fn new(name: &'static str) -> Self {
        Self([Permission::new(name)])
    }
}

impl CommandAuthorization for Requires {
    fn required_permissions(&self) -> &[Permission] {
        &self.0
    }
}

/// Check every permission `command` declares for the caller in the request's tenant.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: principal.membership(tenant),
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Shorthand used by handlers.
pub fn require(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), ApiError> {
    authorize_command(tenant, principal, &Requires::new(permission)).map_err(ApiError::from)
}
