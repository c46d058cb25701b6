use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_core::TenantId;
use storeledger_customers::customer::AGGREGATE_TYPE;
use storeledger_customers::{ContactInfo, CustomerEvent, CustomerId, CustomerStatus};
use storeledger_events::EventEnvelope;

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Customer directory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerReadModel {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactInfo,
    pub credit_limit: Option<u64>,
    pub status: CustomerStatus,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CustomerDirectoryProjection<S = InMemoryTenantStore<CustomerId, CustomerReadModel>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> CustomerDirectoryProjection<S>
where
    S: TenantStore<CustomerId, CustomerReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, customer_id: &CustomerId) -> Option<CustomerReadModel> {
        self.store.get(tenant_id, customer_id)
    }

    /// Customers ordered by name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<CustomerReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.customer_id.cmp(&b.customer_id))
        });
        rows
    }

    pub fn names(&self, tenant_id: TenantId) -> BTreeMap<CustomerId, String> {
        self.store
            .list(tenant_id)
            .into_iter()
            .map(|c| (c.customer_id, c.name))
            .collect()
    }
}

impl<S> Projection for CustomerDirectoryProjection<S>
where
    S: TenantStore<CustomerId, CustomerReadModel>,
{
    fn name(&self) -> &'static str {
        "customers.directory"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: CustomerEvent = decode(envelope, AGGREGATE_TYPE)?;
        let (tenant_id, customer_id) = match &ev {
            CustomerEvent::CustomerRegistered(e) => (e.tenant_id, e.customer_id),
            CustomerEvent::CustomerUpdated(e) => (e.tenant_id, e.customer_id),
            CustomerEvent::CustomerSuspended(e) => (e.tenant_id, e.customer_id),
            CustomerEvent::CustomerReactivated(e) => (e.tenant_id, e.customer_id),
        };
        check_scope(envelope, tenant_id, customer_id.0)?;

        match ev {
            CustomerEvent::CustomerRegistered(e) => {
                self.store.upsert(
                    tenant_id,
                    customer_id,
                    CustomerReadModel {
                        customer_id,
                        name: e.name,
                        contact: e.contact,
                        credit_limit: e.credit_limit,
                        status: CustomerStatus::Active,
                        registered_at: e.occurred_at,
                    },
                );
            }
            CustomerEvent::CustomerUpdated(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &customer_id) {
                    row.name = e.name;
                    row.contact = e.contact;
                    row.credit_limit = e.credit_limit;
                    self.store.upsert(tenant_id, customer_id, row);
                }
            }
            CustomerEvent::CustomerSuspended(_) => {
                self.set_status(tenant_id, customer_id, CustomerStatus::Suspended);
            }
            CustomerEvent::CustomerReactivated(_) => {
                self.set_status(tenant_id, customer_id, CustomerStatus::Active);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

impl<S> CustomerDirectoryProjection<S>
where
    S: TenantStore<CustomerId, CustomerReadModel>,
{
    fn set_status(&self, tenant_id: TenantId, customer_id: CustomerId, status: CustomerStatus) {
        if let Some(mut row) = self.store.get(tenant_id, &customer_id) {
            row.status = status;
            self.store.upsert(tenant_id, customer_id, row);
        }
    }
}
