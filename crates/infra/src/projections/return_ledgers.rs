use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_core::TenantId;
use storeledger_customers::CustomerId;
use storeledger_events::EventEnvelope;
use storeledger_invoicing::InvoiceId;
use storeledger_products::ProductId;
use storeledger_returns::ledger::AGGREGATE_TYPE;
use storeledger_returns::{ReturnEntry, ReturnLedgerEvent, ReturnLedgerId};

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReturnableProduct {
    pub product_id: ProductId,
    pub sold: u64,
    pub returned: u64,
    pub returnable: u64,
}

/// Returns and exchanges recorded against one original invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnLedgerReadModel {
    pub original_invoice_id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub products: Vec<ReturnableProduct>,
    pub entries: Vec<ReturnEntry>,
    pub fully_returned: bool,
}

impl ReturnLedgerReadModel {
    pub fn has_returns(&self) -> bool {
        !self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct ReturnLedgersProjection<S = InMemoryTenantStore<InvoiceId, ReturnLedgerReadModel>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ReturnLedgersProjection<S>
where
    S: TenantStore<InvoiceId, ReturnLedgerReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, original: &InvoiceId) -> Option<ReturnLedgerReadModel> {
        self.store.get(tenant_id, original)
    }
}

impl<S> Projection for ReturnLedgersProjection<S>
where
    S: TenantStore<InvoiceId, ReturnLedgerReadModel>,
{
    fn name(&self) -> &'static str {
        "returns.ledgers"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: ReturnLedgerEvent = decode(envelope, AGGREGATE_TYPE)?;
        let (tenant_id, original) = match &ev {
            ReturnLedgerEvent::LedgerOpened(e) => (e.tenant_id, e.original_invoice_id),
            ReturnLedgerEvent::ReturnRecorded(e) => (e.tenant_id, e.original_invoice_id),
        };
        check_scope(envelope, tenant_id, ReturnLedgerId::for_invoice(original).0)?;

        match ev {
            ReturnLedgerEvent::LedgerOpened(e) => {
                let mut products: Vec<ReturnableProduct> = Vec::new();
                for row in &e.sold {
                    match products.iter_mut().find(|p| p.product_id == row.product_id) {
                        Some(p) => {
                            p.sold += row.quantity;
                            p.returnable += row.quantity;
                        }
                        None => products.push(ReturnableProduct {
                            product_id: row.product_id,
                            sold: row.quantity,
                            returned: 0,
                            returnable: row.quantity,
                        }),
                    }
                }
                self.store.upsert(
                    tenant_id,
                    original,
                    ReturnLedgerReadModel {
                        original_invoice_id: original,
                        customer_id: e.customer_id,
                        products,
                        entries: Vec::new(),
                        fully_returned: false,
                    },
                );
            }
            ReturnLedgerEvent::ReturnRecorded(e) => {
                if let Some(mut ledger) = self.store.get(tenant_id, &original) {
                    for row in &e.entry.returned {
                        if let Some(p) = ledger
                            .products
                            .iter_mut()
                            .find(|p| p.product_id == row.product_id)
                        {
                            p.returned += row.quantity;
                            p.returnable = p.sold.saturating_sub(p.returned);
                        }
                    }
                    ledger.entries.push(e.entry);
                    ledger.fully_returned = e.fully_returned;
                    self.store.upsert(tenant_id, original, ledger);
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
