use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_closing::business_date;
use storeledger_core::{TenantId, UserId};
use storeledger_customers::CustomerId;
use storeledger_events::EventEnvelope;
use storeledger_invoicing::invoice::AGGREGATE_TYPE;
use storeledger_invoicing::{
    InvoiceEvent, InvoiceId, InvoiceKind, InvoiceLine, InvoiceStatus, InvoiceTotals,
};

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentRecord {
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Queryable invoice: header, priced lines and payment history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub kind: InvoiceKind,
    pub status: InvoiceStatus,
    pub customer_id: Option<CustomerId>,
    pub original_invoice_id: Option<InvoiceId>,
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
    pub invoice_discount: u64,
    pub settled: i64,
    pub balance_due: i64,
    pub issued_by: Option<UserId>,
    pub note: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub business_date: NaiveDate,
    pub payments: Vec<PaymentRecord>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub reversed_settlement: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceFilter {
    pub kind: Option<InvoiceKind>,
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<CustomerId>,
}

impl InvoiceFilter {
    fn matches(&self, invoice: &InvoiceReadModel) -> bool {
        self.kind.is_none_or(|k| invoice.kind == k)
            && self.status.is_none_or(|s| invoice.status == s)
            && self
                .customer_id
                .is_none_or(|c| invoice.customer_id == Some(c))
    }
}

#[derive(Debug)]
pub struct InvoicesProjection<S = InMemoryTenantStore<InvoiceId, InvoiceReadModel>> {
    store: S,
    cursors: StreamCursors,
    offset: FixedOffset,
}

impl<S> InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    /// `offset` is the shop's UTC offset, used to stamp the business date.
    pub fn new(store: S, offset: FixedOffset) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
            offset,
        }
    }

    pub fn get(&self, tenant_id: TenantId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(tenant_id, invoice_id)
    }

    /// Matching invoices, newest first.
    pub fn list(&self, tenant_id: TenantId, filter: InvoiceFilter) -> Vec<InvoiceReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|i| filter.matches(i))
            .collect();
        rows.sort_by(|a, b| {
            b.issued_at
                .cmp(&a.issued_at)
                .then(b.invoice_id.cmp(&a.invoice_id))
        });
        rows
    }

    /// Return and exchange documents issued against `original`.
    pub fn documents_for(&self, tenant_id: TenantId, original: InvoiceId) -> Vec<InvoiceReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|i| i.original_invoice_id == Some(original))
            .collect();
        rows.sort_by_key(|i| i.issued_at);
        rows
    }
}

impl<S> Projection for InvoicesProjection<S>
where
    S: TenantStore<InvoiceId, InvoiceReadModel>,
{
    fn name(&self) -> &'static str {
        "invoicing.invoices"
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
                let balance_due = e.totals.net_total - e.settled_amount;
                self.store.upsert(
                    tenant_id,
                    invoice_id,
                    InvoiceReadModel {
                        invoice_id,
                        kind: e.kind,
                        status: if balance_due == 0 {
                            InvoiceStatus::Settled
                        } else {
                            InvoiceStatus::Open
                        },
                        customer_id: e.customer_id,
                        original_invoice_id: e.original_invoice_id,
                        lines: e.lines,
                        totals: e.totals,
                        invoice_discount: e.invoice_discount,
                        settled: e.settled_amount,
                        balance_due,
                        issued_by: e.issued_by,
                        note: e.note,
                        issued_at: e.occurred_at,
                        business_date: business_date(e.occurred_at, self.offset),
                        payments: Vec::new(),
                        voided_at: None,
                        void_reason: None,
                        reversed_settlement: 0,
                    },
                );
            }
            InvoiceEvent::PaymentRegistered(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &invoice_id) {
                    row.settled = e.new_settled;
                    row.balance_due = e.balance_due;
                    if e.balance_due == 0 {
                        row.status = InvoiceStatus::Settled;
                    }
                    row.payments.push(PaymentRecord {
                        amount: e.amount,
                        occurred_at: e.occurred_at,
                    });
                    self.store.upsert(tenant_id, invoice_id, row);
                }
            }
            InvoiceEvent::InvoiceVoided(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &invoice_id) {
                    row.status = InvoiceStatus::Void;
                    row.voided_at = Some(e.occurred_at);
                    row.void_reason = e.reason;
                    row.reversed_settlement = e.reversed_settlement;
                    self.store.upsert(tenant_id, invoice_id, row);
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
