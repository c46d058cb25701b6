//! Cashier checkout.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::money::signed;
use storeledger_core::{AggregateId, TenantId, UserId};
use storeledger_customers::{CustomerId, CustomerStatus};
use storeledger_inventory::stock::AGGREGATE_TYPE as STOCK;
use storeledger_inventory::{InventoryCommand, IssueStock, StockItemId};
use storeledger_invoicing::invoice::AGGREGATE_TYPE as INVOICE;
use storeledger_invoicing::{
    InvoiceCommand, InvoiceId, InvoiceKind, InvoiceLine, InvoiceTotals, IssueInvoice,
    LineDirection, LineInput, price_lines,
};
use storeledger_products::{ProductId, ProductStatus};

use super::WorkflowError;
use super::records::{invoice_stream, stock_stream};
use crate::projections::InvoiceReadModel;
use crate::services::ShopServices;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub product_id: ProductId,
    pub quantity: u64,
    /// Discount for the whole line.
    #[serde(default)]
    pub discount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// `None` for a walk-in customer.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub invoice_discount: u64,
    /// Money handed over at the counter.
    #[serde(default)]
    pub tendered: u64,
    #[serde(default)]
    pub note: Option<String>,
}

/// What the cashier prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub invoice_id: InvoiceId,
    pub kind: InvoiceKind,
    pub business_date: NaiveDate,
    pub customer_id: Option<CustomerId>,
    pub original_invoice_id: Option<InvoiceId>,
    pub lines: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
    pub settled: i64,
    pub balance_due: i64,
    pub tendered: u64,
    pub change_due: u64,
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    pub(crate) fn new(invoice: InvoiceReadModel, tendered: u64) -> Self {
        let change_due = if invoice.settled > 0 {
            tendered.saturating_sub(invoice.settled.unsigned_abs())
        } else {
            0
        };
        Self {
            invoice_id: invoice.invoice_id,
            kind: invoice.kind,
            business_date: invoice.business_date,
            customer_id: invoice.customer_id,
            original_invoice_id: invoice.original_invoice_id,
            lines: invoice.lines,
            totals: invoice.totals,
            settled: invoice.settled,
            balance_due: invoice.balance_due,
            tendered,
            change_due,
            issued_at: invoice.issued_at,
        }
    }
}

impl ShopServices {
    /// Sell goods at the counter.
    pub fn checkout(
        &self,
        tenant_id: TenantId,
        cashier: Option<UserId>,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Receipt, WorkflowError> {
        let _guard = self.lock();
        if request.items.is_empty() {
            return Err(WorkflowError::Invalid("checkout needs at least one item".into()));
        }
        self.ensure_day_open(tenant_id, self.business_date(now))?;
        if let Some(customer_id) = request.customer_id {
            self.ensure_customer_can_buy(tenant_id, customer_id)?;
        }

        let (lines, issued) = self.sale_lines(tenant_id, &request.items)?;
        let (_, totals) = price_lines(&lines, request.invoice_discount, LineDirection::Out)?;
        let net = totals.net_total;
        let tendered = signed(request.tendered)?;
        if request.customer_id.is_none() && tendered < net {
            return Err(WorkflowError::Rejected(format!(
                "walk-in sales must be paid in full: {net} due, {tendered} tendered"
            )));
        }
        let settled = tendered.min(net);
        if let Some(customer_id) = request.customer_id {
            self.ensure_credit(tenant_id, customer_id, net - settled)?;
        }

        let invoice_id = InvoiceId::new(AggregateId::new());
        self.execute(
            tenant_id,
            invoice_id.0,
            INVOICE,
            InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id,
                kind: InvoiceKind::Sale,
                customer_id: request.customer_id,
                original_invoice_id: None,
                lines,
                invoice_discount: request.invoice_discount,
                settled_amount: settled,
                issued_by: cashier,
                note: request.note,
                occurred_at: now,
            }),
            invoice_stream,
        )?;
        self.issue_goods(tenant_id, invoice_id, &issued, now)?;

        tracing::info!(
            %tenant_id,
            %invoice_id,
            net_total = net,
            settled,
            walk_in = request.customer_id.is_none(),
            "sale completed"
        );
        Ok(Receipt::new(self.invoice(tenant_id, invoice_id)?, request.tendered))
    }

    pub(crate) fn ensure_customer_can_buy(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<(), WorkflowError> {
        let customer = self.customer(tenant_id, customer_id)?;
        if customer.status != CustomerStatus::Active {
            return Err(WorkflowError::Rejected(format!(
                "customer {} is suspended",
                customer.name
            )));
        }
        Ok(())
    }

    /// New debt may not take the customer past their credit limit.
    pub(crate) fn ensure_credit(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        new_debt: i64,
    ) -> Result<(), WorkflowError> {
        if new_debt <= 0 {
            return Ok(());
        }
        let customer = self.customer(tenant_id, customer_id)?;
        let Some(limit) = customer.credit_limit else {
            return Ok(());
        };
        let outstanding = self.hub().balances.outstanding(tenant_id, customer_id);
        let limit = signed(limit)?;
        if outstanding.saturating_add(new_debt) > limit {
            return Err(WorkflowError::Rejected(format!(
                "credit limit of {} exceeded: {outstanding} outstanding, {new_debt} more requested",
                customer.name
            )));
        }
        Ok(())
    }

    /// Catalog-priced outgoing lines, with the merged quantity per product.
    pub(crate) fn sale_lines(
        &self,
        tenant_id: TenantId,
        items: &[CheckoutItem],
    ) -> Result<(Vec<LineInput>, BTreeMap<ProductId, u64>), WorkflowError> {
        let mut lines = Vec::with_capacity(items.len());
        let mut wanted: BTreeMap<ProductId, u64> = BTreeMap::new();

        for item in items {
            if item.quantity == 0 {
                return Err(WorkflowError::Invalid("item quantity must be positive".into()));
            }
            let product = self.product(tenant_id, item.product_id)?;
            if product.status != ProductStatus::Active {
                return Err(WorkflowError::Rejected(format!(
                    "{} is archived",
                    product.name
                )));
            }
            if product.pricing.sale_price == 0 {
                return Err(WorkflowError::Rejected(format!(
                    "{} has no sale price",
                    product.name
                )));
            }

            let slot = wanted.entry(item.product_id).or_insert(0);
            *slot = slot
                .checked_add(item.quantity)
                .ok_or_else(|| WorkflowError::Invalid("item quantity too large".into()))?;

            let average_cost = self
                .hub()
                .stock
                .get(tenant_id, &item.product_id)
                .map(|s| s.average_cost)
                .unwrap_or(0);
            lines.push(LineInput {
                product_id: item.product_id,
                product_name: product.name,
                direction: LineDirection::Out,
                quantity: item.quantity,
                unit_price: product.pricing.sale_price,
                unit_cost: if average_cost > 0 {
                    average_cost
                } else {
                    product.pricing.cost_price
                },
                discount: item.discount,
            });
        }

        for (product_id, quantity) in &wanted {
            let on_hand = self.hub().stock.on_hand(tenant_id, product_id);
            if on_hand < 0 || (on_hand as u64) < *quantity {
                let name = lines
                    .iter()
                    .find(|l| l.product_id == *product_id)
                    .map(|l| l.product_name.as_str())
                    .unwrap_or_default();
                return Err(WorkflowError::Rejected(format!(
                    "insufficient stock for {name}: {on_hand} on hand, {quantity} requested"
                )));
            }
        }

        Ok((lines, wanted))
    }

    pub(crate) fn issue_goods(
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
                InventoryCommand::IssueStock(IssueStock {
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
