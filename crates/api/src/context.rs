use storeledger_auth::{PrincipalId, Role, TenantMembership, membership_for};
use storeledger_core::{TenantId, UserId};

/// Shop a request acts for, taken from the verified token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated caller and their roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self {
            principal_id,
            roles,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    /// The caller as recorded on invoices and closings.
    pub fn user_id(&self) -> UserId {
        self.principal_id.as_user_id()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Effective permissions of the caller in `tenant`.
    pub fn membership(&self, tenant: &TenantContext) -> TenantMembership {
        membership_for(tenant.tenant_id(), &self.roles)
    }
}
