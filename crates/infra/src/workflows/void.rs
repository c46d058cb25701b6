use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use storeledger_core::TenantId;
use storeledger_inventory::stock::AGGREGATE_TYPE as STOCK;
use storeledger_inventory::{InventoryCommand, RestockReturn, StockItemId};
use storeledger_invoicing::invoice::AGGREGATE_TYPE as INVOICE;
use storeledger_invoicing::{InvoiceCommand, InvoiceId, InvoiceKind, LineDirection, VoidInvoice};
use storeledger_products::ProductId;

use super::WorkflowError;
use super::records::{invoice_stream, stock_stream};
use crate::projections::InvoiceReadModel;
use crate::services::ShopServices;

impl ShopServices {
    /// Cancel a sale and put its goods back on the shelf.
    pub fn void_invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<InvoiceReadModel, WorkflowError> {
        let _guard = self.lock();
        let invoice = self.invoice(tenant_id, invoice_id)?;
        if invoice.kind != InvoiceKind::Sale {
            return Err(WorkflowError::Rejected(format!(
                "a {} document cannot be voided",
                invoice.kind.as_str()
            )));
        }
        self.ensure_day_open(tenant_id, invoice.business_date)?;
        if self
            .hub()
            .returns
            .get(tenant_id, &invoice_id)
            .is_some_and(|ledger| ledger.has_returns())
        {
            return Err(WorkflowError::Rejected(
                "goods were already returned against this invoice".into(),
            ));
        }

        self.execute(
            tenant_id,
            invoice_id.0,
            INVOICE,
            InvoiceCommand::VoidInvoice(VoidInvoice {
                tenant_id,
                invoice_id,
                reason,
                occurred_at: now,
            }),
            invoice_stream,
        )?;

        let mut issued: BTreeMap<ProductId, u64> = BTreeMap::new();
        for line in invoice.lines.iter().filter(|l| l.direction == LineDirection::Out) {
            *issued.entry(line.product_id).or_insert(0) += line.quantity;
        }
        self.restock_goods(tenant_id, invoice_id, &issued, now)?;

        tracing::info!(%tenant_id, %invoice_id, "invoice voided");
        self.invoice(tenant_id, invoice_id)
    }

    pub(crate) fn restock_goods(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        quantities: &BTreeMap<ProductId, u64>,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        for (product_id, quantity) in quantities {
            self.execute(
                tenant_id,
                StockItemId::for_product(*product_id).0,
                STOCK,
                InventoryCommand::RestockReturn(RestockReturn {
                    tenant_id,
                    product_id: *product_id,
                    quantity: *quantity,
                    invoice_id,
                    occurred_at: now,
                }),
                stock_stream,
            )?;
        }
        Ok(())
    }
}
