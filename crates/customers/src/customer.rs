use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use storeledger_events::Event;

/// Stream type of customer aggregates.
pub const AGGREGATE_TYPE: &str = "customers.customer";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub AggregateId);

impl CustomerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Aggregate root: a shop customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    id: CustomerId,
    tenant_id: Option<TenantId>,
    name: String,
    contact: ContactInfo,
    /// Maximum outstanding debt; `None` means unlimited.
    credit_limit: Option<u64>,
    status: CustomerStatus,
    version: u64,
    created: bool,
}

impl Customer {
    /// Empty, not-yet-registered instance for rehydration.
    pub fn empty(id: CustomerId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            contact: ContactInfo::default(),
            credit_limit: None,
            status: CustomerStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn credit_limit(&self) -> Option<u64> {
        self.credit_limit
    }

    pub fn status(&self) -> CustomerStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Only active customers may be attached to new invoices.
    pub fn can_transact(&self) -> bool {
        self.created && self.status == CustomerStatus::Active
    }
}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCustomer {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: Option<ContactInfo>,
    pub credit_limit: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update; `None` keeps the current value.
///
/// `credit_limit: Some(None)` removes the limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCustomer {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub credit_limit: Option<Option<u64>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendCustomer {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactivateCustomer {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerCommand {
    RegisterCustomer(RegisterCustomer),
    UpdateCustomer(UpdateCustomer),
    SuspendCustomer(SuspendCustomer),
    ReactivateCustomer(ReactivateCustomer),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub credit_limit: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

/// Carries the full resulting details, not a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUpdated {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub credit_limit: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSuspended {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerReactivated {
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerEvent {
    CustomerRegistered(CustomerRegistered),
    CustomerUpdated(CustomerUpdated),
    CustomerSuspended(CustomerSuspended),
    CustomerReactivated(CustomerReactivated),
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerRegistered(_) => "customers.customer.registered",
            CustomerEvent::CustomerUpdated(_) => "customers.customer.updated",
            CustomerEvent::CustomerSuspended(_) => "customers.customer.suspended",
            CustomerEvent::CustomerReactivated(_) => "customers.customer.reactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::CustomerRegistered(e) => e.occurred_at,
            CustomerEvent::CustomerUpdated(e) => e.occurred_at,
            CustomerEvent::CustomerSuspended(e) => e.occurred_at,
            CustomerEvent::CustomerReactivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Customer {
    type Command = CustomerCommand;
    type Event = CustomerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::CustomerRegistered(e) => {
                self.id = e.customer_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.credit_limit = e.credit_limit;
                self.status = CustomerStatus::Active;
                self.created = true;
            }
            CustomerEvent::CustomerUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.credit_limit = e.credit_limit;
            }
            CustomerEvent::CustomerSuspended(_) => {
                self.status = CustomerStatus::Suspended;
            }
            CustomerEvent::CustomerReactivated(_) => {
                self.status = CustomerStatus::Active;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::RegisterCustomer(cmd) => self.handle_register(cmd),
            CustomerCommand::UpdateCustomer(cmd) => self.handle_update(cmd),
            CustomerCommand::SuspendCustomer(cmd) => self.handle_suspend(cmd),
            CustomerCommand::ReactivateCustomer(cmd) => self.handle_reactivate(cmd),
        }
    }
}

impl Customer {
    fn ensure_existing(&self, tenant_id: TenantId, customer_id: CustomerId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != customer_id {
            return Err(DomainError::invariant("customer_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("customer already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![CustomerEvent::CustomerRegistered(CustomerRegistered {
            tenant_id: cmd.tenant_id,
            customer_id: cmd.customer_id,
            name: name.to_string(),
            contact: cmd.contact.clone().unwrap_or_default(),
            credit_limit: cmd.credit_limit,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.customer_id)?;

        if cmd.name.is_none() && cmd.contact.is_none() && cmd.credit_limit.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }

        let name = match &cmd.name {
            Some(n) => n.trim().to_string(),
            None => self.name.clone(),
        };
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![CustomerEvent::CustomerUpdated(CustomerUpdated {
            tenant_id: cmd.tenant_id,
            customer_id: cmd.customer_id,
            name,
            contact: cmd.contact.clone().unwrap_or_else(|| self.contact.clone()),
            credit_limit: cmd.credit_limit.unwrap_or(self.credit_limit),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.customer_id)?;

        if self.status == CustomerStatus::Suspended {
            return Err(DomainError::conflict("customer is already suspended"));
        }

        Ok(vec![CustomerEvent::CustomerSuspended(CustomerSuspended {
            tenant_id: cmd.tenant_id,
            customer_id: cmd.customer_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reactivate(&self, cmd: &ReactivateCustomer) -> Result<Vec<CustomerEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.customer_id)?;

        if self.status == CustomerStatus::Active {
            return Err(DomainError::conflict("customer is already active"));
        }

        Ok(vec![CustomerEvent::CustomerReactivated(CustomerReactivated {
            tenant_id: cmd.tenant_id,
            customer_id: cmd.customer_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeledger_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_customer_id() -> CustomerId {
        CustomerId::new(AggregateId::new())
    }

    fn registered(tenant_id: TenantId, customer_id: CustomerId) -> Customer {
        let mut customer = Customer::empty(customer_id);
        execute(
            &mut customer,
            &CustomerCommand::RegisterCustomer(RegisterCustomer {
                tenant_id,
                customer_id,
                name: "  Karim Farms ".to_string(),
                contact: Some(ContactInfo {
                    phone: Some("+8801700000000".to_string()),
                    email: None,
                    address: Some("Bogura".to_string()),
                }),
                credit_limit: Some(50_000),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        customer
    }

    #[test]
    fn register_trims_name_and_activates() {
        let tenant_id = test_tenant_id();
        let customer_id = test_customer_id();
        let customer = registered(tenant_id, customer_id);

        assert_eq!(customer.name(), "Karim Farms");
        assert_eq!(customer.credit_limit(), Some(50_000));
        assert_eq!(customer.tenant_id(), Some(tenant_id));
        assert!(customer.can_transact());
        assert_eq!(customer.version(), 1);
    }

    #[test]
    fn register_rejects_blank_name() {
        let customer_id = test_customer_id();
        let customer = Customer::empty(customer_id);
        let err = customer
            .handle(&CustomerCommand::RegisterCustomer(RegisterCustomer {
                tenant_id: test_tenant_id(),
                customer_id,
                name: "   ".to_string(),
                contact: None,
                credit_limit: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        match err {
            DomainError::Validation(msg) if msg.contains("name") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn register_twice_conflicts() {
        let tenant_id = test_tenant_id();
        let customer_id = test_customer_id();
        let customer = registered(tenant_id, customer_id);

        let err = customer
            .handle(&CustomerCommand::RegisterCustomer(RegisterCustomer {
                tenant_id,
                customer_id,
                name: "Again".to_string(),
                contact: None,
                credit_limit: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_keeps_unspecified_fields_and_can_clear_limit() {
        let tenant_id = test_tenant_id();
        let customer_id = test_customer_id();
        let mut customer = registered(tenant_id, customer_id);

        execute(
            &mut customer,
            &CustomerCommand::UpdateCustomer(UpdateCustomer {
                tenant_id,
                customer_id,
                name: None,
                contact: None,
                credit_limit: Some(None),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(customer.name(), "Karim Farms");
        assert_eq!(customer.contact().address.as_deref(), Some("Bogura"));
        assert_eq!(customer.credit_limit(), None);
    }

    #[test]
    fn empty_update_is_rejected() {
        let tenant_id = test_tenant_id();
        let customer_id = test_customer_id();
        let customer = registered(tenant_id, customer_id);

        let err = customer
            .handle(&CustomerCommand::UpdateCustomer(UpdateCustomer {
                tenant_id,
                customer_id,
                name: None,
                contact: None,
                credit_limit: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn suspend_and_reactivate_cycle() {
        let tenant_id = test_tenant_id();
        let customer_id = test_customer_id();
        let mut customer = registered(tenant_id, customer_id);

        let suspend = CustomerCommand::SuspendCustomer(SuspendCustomer {
            tenant_id,
            customer_id,
            reason: Some("unpaid debt".to_string()),
            occurred_at: Utc::now(),
        });
        execute(&mut customer, &suspend).unwrap();
        assert!(!customer.can_transact());
        assert!(matches!(
            customer.handle(&suspend),
            Err(DomainError::Conflict(_))
        ));

        let reactivate = CustomerCommand::ReactivateCustomer(ReactivateCustomer {
            tenant_id,
            customer_id,
            occurred_at: Utc::now(),
        });
        execute(&mut customer, &reactivate).unwrap();
        assert!(customer.can_transact());
        assert!(matches!(
            customer.handle(&reactivate),
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(customer.version(), 3);
    }

    #[test]
    fn commands_from_another_tenant_are_rejected() {
        let customer_id = test_customer_id();
        let customer = registered(test_tenant_id(), customer_id);

        let err = customer
            .handle(&CustomerCommand::SuspendCustomer(SuspendCustomer {
                tenant_id: test_tenant_id(),
                customer_id,
                reason: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();

        match err {
            DomainError::InvariantViolation(msg) if msg.contains("tenant") => {}
            other => panic!("expected tenant mismatch, got {other:?}"),
        }
    }

    #[test]
    fn commands_on_unknown_customer_are_not_found() {
        let customer_id = test_customer_id();
        let err = Customer::empty(customer_id)
            .handle(&CustomerCommand::ReactivateCustomer(ReactivateCustomer {
                tenant_id: test_tenant_id(),
                customer_id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Registration stores the trimmed name whatever padding surrounds it.
            #[test]
            fn registered_name_is_trimmed(
                pad_left in " {0,4}",
                name in "[A-Za-z][A-Za-z0-9 ]{0,40}[A-Za-z0-9]",
                pad_right in " {0,4}"
            ) {
                let customer_id = test_customer_id();
                let mut customer = Customer::empty(customer_id);
                execute(&mut customer, &CustomerCommand::RegisterCustomer(RegisterCustomer {
                    tenant_id: test_tenant_id(),
                    customer_id,
                    name: format!("{pad_left}{name}{pad_right}"),
                    contact: None,
                    credit_limit: None,
                    occurred_at: Utc::now(),
                })).unwrap();
                prop_assert_eq!(customer.name(), name.as_str());
            }
        }
    }
}
