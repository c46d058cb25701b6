//! Customer Balances Projection.
//!
//! Debt per customer, folded from invoice events. Each invoice's contribution
//! is kept separately so a payment or a void can replace it and the customer's
//! row is recomputed from what is left.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_core::TenantId;
use storeledger_customers::CustomerId;
use storeledger_events::EventEnvelope;
use storeledger_invoicing::invoice::AGGREGATE_TYPE;
use storeledger_invoicing::{InvoiceEvent, InvoiceId};

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Read model: per-customer balance for a tenant.
///
/// - `outstanding`: what the customer still owes; negative when the shop owes them
/// - `purchases` / `returns`: lifetime goods value net of discounts
/// - `paid`: money settled across their invoices, refunds subtracted
/// - `open_invoices`: invoices with a non-zero balance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerBalance {
    pub customer_id: Option<CustomerId>,
    pub outstanding: i64,
    pub purchases: u64,
    pub returns: u64,
    pub paid: i64,
    pub open_invoices: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Contribution {
    customer_id: CustomerId,
    net_out: u64,
    net_in: u64,
    net_total: i64,
    settled: i64,
    voided: bool,
}

#[derive(Debug)]
pub struct CustomerBalancesProjection<S = InMemoryTenantStore<CustomerId, CustomerBalance>> {
    store: S,
    contributions: RwLock<HashMap<(TenantId, InvoiceId), Contribution>>,
    cursors: StreamCursors,
}

impl<S> CustomerBalancesProjection<S>
where
    S: TenantStore<CustomerId, CustomerBalance>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            contributions: RwLock::new(HashMap::new()),
            cursors: StreamCursors::new(),
        }
    }

    /// Balance of a customer; a customer without invoices owes nothing.
    pub fn get(&self, tenant_id: TenantId, customer_id: CustomerId) -> CustomerBalance {
        self.store
            .get(tenant_id, &customer_id)
            .unwrap_or(CustomerBalance {
                customer_id: Some(customer_id),
                ..CustomerBalance::default()
            })
    }

    pub fn outstanding(&self, tenant_id: TenantId, customer_id: CustomerId) -> i64 {
        self.get(tenant_id, customer_id).outstanding
    }

    /// Customers with a non-zero balance, largest debt first.
    pub fn debtors(&self, tenant_id: TenantId) -> Vec<CustomerBalance> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|b| b.outstanding != 0)
            .collect();
        rows.sort_by(|a, b| b.outstanding.cmp(&a.outstanding));
        rows
    }

    fn record(&self, tenant_id: TenantId, invoice_id: InvoiceId, contribution: Contribution) {
        let customer_id = contribution.customer_id;
        let balance = match self.contributions.write() {
            Ok(mut map) => {
                map.insert((tenant_id, invoice_id), contribution);
                fold(map.iter().filter_map(|((t, _), c)| {
                    (*t == tenant_id && c.customer_id == customer_id && !c.voided).then_some(c)
                }))
            }
            Err(_) => return,
        };
        self.store.upsert(
            tenant_id,
            customer_id,
            CustomerBalance {
                customer_id: Some(customer_id),
                ..balance
            },
        );
    }

    fn contribution(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Option<Contribution> {
        self.contributions
            .read()
            .ok()
            .and_then(|map| map.get(&(tenant_id, invoice_id)).copied())
    }
}

fn fold<'a>(contributions: impl Iterator<Item = &'a Contribution>) -> CustomerBalance {
    let mut balance = CustomerBalance::default();
    for c in contributions {
        let due = c.net_total - c.settled;
        balance.outstanding += due;
        balance.purchases += c.net_out;
        balance.returns += c.net_in;
        balance.paid += c.settled;
        if due != 0 {
            balance.open_invoices += 1;
        }
    }
    balance
}

impl<S> Projection for CustomerBalancesProjection<S>
where
    S: TenantStore<CustomerId, CustomerBalance>,
{
    fn name(&self) -> &'static str {
        "customers.balances"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: InvoiceEvent = decode(envelope, AGGREGATE_TYPE)?;
        let (tenant_id, invoice_id) = match &ev {
            InvoiceEvent::InvoiceIssued(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::PaymentRegistered(e) => (e.tenant_id, e.invoice_id),
            InvoiceEvent::InvoiceVoided(e) => (e.tenant_id, e.invoice_id),
        };
        check_scope(envelope, tenant_id, invoice_id.0)?;

        match ev {
            // Walk-in invoices are settled at the counter and leave no debt behind.
            InvoiceEvent::InvoiceIssued(e) => {
                if let Some(customer_id) = e.customer_id {
                    self.record(
                        tenant_id,
                        invoice_id,
                        Contribution {
                            customer_id,
                            net_out: e.totals.net_out,
                            net_in: e.totals.net_in,
                            net_total: e.totals.net_total,
                            settled: e.settled_amount,
                            voided: false,
                        },
                    );
                }
            }
            InvoiceEvent::PaymentRegistered(e) => {
                if let Some(mut c) = self.contribution(tenant_id, invoice_id) {
                    c.settled = e.new_settled;
                    self.record(tenant_id, invoice_id, c);
                }
            }
            InvoiceEvent::InvoiceVoided(_) => {
                if let Some(mut c) = self.contribution(tenant_id, invoice_id) {
                    c.voided = true;
                    self.record(tenant_id, invoice_id, c);
                }
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        if let Ok(mut map) = self.contributions.write() {
            map.retain(|(t, _), _| *t != tenant_id);
        }
        self.cursors.clear_tenant(tenant_id);
    }
}
