//! Line-level customer transactions, grouped per invoice.
//!
//! A void keeps the rows but flags the group, so closings can leave it out of
//! the totals and still report it on its issue day.

use std::collections::BTreeSet;

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_closing::{
    CustomerTransaction, VoidedInvoice, business_date, settlement_transaction,
    transactions_for_invoice,
};
use storeledger_core::TenantId;
use storeledger_customers::CustomerId;
use storeledger_events::EventEnvelope;
use storeledger_invoicing::invoice::AGGREGATE_TYPE;
use storeledger_invoicing::{InvoiceEvent, InvoiceId, InvoiceKind};

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceTransactions {
    pub invoice_id: InvoiceId,
    pub kind: InvoiceKind,
    pub customer_id: Option<CustomerId>,
    pub issue_date: NaiveDate,
    pub net_total: i64,
    pub voided: bool,
    pub rows: Vec<CustomerTransaction>,
}

#[derive(Debug)]
pub struct CustomerTransactionsProjection<
    S = InMemoryTenantStore<InvoiceId, InvoiceTransactions>,
> {
    store: S,
    cursors: StreamCursors,
    offset: FixedOffset,
}

impl<S> CustomerTransactionsProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceTransactions>,
{
    pub fn new(store: S, offset: FixedOffset) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
            offset,
        }
    }

    /// Rows dated `date` from invoices that are not void, in time order.
    pub fn for_day(&self, tenant_id: TenantId, date: NaiveDate) -> Vec<CustomerTransaction> {
        let mut rows: Vec<CustomerTransaction> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|group| !group.voided)
            .flat_map(|group| group.rows)
            .filter(|row| row.business_date == date)
            .collect();
        rows.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then(a.invoice_id.cmp(&b.invoice_id))
        });
        rows
    }

    /// Voided invoices issued on `date`.
    pub fn voided_on(&self, tenant_id: TenantId, date: NaiveDate) -> Vec<VoidedInvoice> {
        let mut voided: Vec<VoidedInvoice> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|group| group.voided && group.issue_date == date)
            .map(|group| VoidedInvoice {
                invoice_id: group.invoice_id,
                net_total: group.net_total,
            })
            .collect();
        voided.sort_by_key(|v| v.invoice_id);
        voided
    }

    /// Business days with any row or any voided invoice, in date order.
    pub fn active_dates(&self, tenant_id: TenantId) -> BTreeSet<NaiveDate> {
        let mut dates = BTreeSet::new();
        for group in self.store.list(tenant_id) {
            if group.voided {
                dates.insert(group.issue_date);
            } else {
                dates.extend(group.rows.iter().map(|row| row.business_date));
            }
        }
        dates
    }

    /// A customer's rows across every invoice, newest first. Void invoices are left out.
    pub fn for_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Vec<CustomerTransaction> {
        let mut rows: Vec<CustomerTransaction> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|group| !group.voided && group.customer_id == Some(customer_id))
            .flat_map(|group| group.rows)
            .collect();
        rows.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then(a.invoice_id.cmp(&b.invoice_id))
        });
        rows
    }
}

impl<S> Projection for CustomerTransactionsProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceTransactions>,
{
    fn name(&self) -> &'static str {
        "closing.customer_transactions"
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
            InvoiceEvent::InvoiceIssued(e) => {
                let issue_date = business_date(e.occurred_at, self.offset);
                self.store.upsert(
                    tenant_id,
                    invoice_id,
                    InvoiceTransactions {
                        invoice_id,
                        kind: e.kind,
                        customer_id: e.customer_id,
                        issue_date,
                        net_total: e.totals.net_total,
                        voided: false,
                        rows: transactions_for_invoice(&e, issue_date),
                    },
                );
            }
            InvoiceEvent::PaymentRegistered(e) => {
                if let Some(mut group) = self.store.get(tenant_id, &invoice_id) {
                    group.rows.extend(settlement_transaction(
                        invoice_id,
                        group.kind,
                        group.customer_id,
                        e.amount,
                        e.occurred_at,
                        business_date(e.occurred_at, self.offset),
                    ));
                    self.store.upsert(tenant_id, invoice_id, group);
                }
            }
            InvoiceEvent::InvoiceVoided(_) => {
                if let Some(mut group) = self.store.get(tenant_id, &invoice_id) {
                    group.voided = true;
                    self.store.upsert(tenant_id, invoice_id, group);
                }
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
