//! Returns and exchanges against an earlier invoice.
//!
//! Order of dispatches: the ledger records the return first (it enforces
//! returnable quantities), then the return or exchange invoice is issued,
//! then stock moves.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::money::line_amount;
use storeledger_core::{AggregateId, DomainError, TenantId, UserId};
use storeledger_invoicing::invoice::AGGREGATE_TYPE as INVOICE;
use storeledger_invoicing::{
    InvoiceCommand, InvoiceId, InvoiceKind, InvoiceStatus, IssueInvoice, LineDirection,
    LineInput, price_lines,
};
use storeledger_products::ProductId;
use storeledger_returns::ledger::AGGREGATE_TYPE as LEDGER;
use storeledger_returns::{
    OpenLedger, RecordReturn, ReturnKind, ReturnLedger, ReturnLedgerCommand, ReturnLedgerId,
    ReturnedQuantity,
};

use super::WorkflowError;
use super::checkout::{CheckoutItem, Receipt};
use super::records::invoice_stream;
use crate::projections::InvoiceReadModel;
use crate::services::ShopServices;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub product_id: ProductId,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub original_invoice_id: InvoiceId,
    pub returned: Vec<ReturnItem>,
    /// Goods handed out in exchange; empty for a plain return.
    #[serde(default)]
    pub replacements: Vec<CheckoutItem>,
    /// Settle the difference at the counter. Walk-ins always settle.
    #[serde(default)]
    pub settle_now: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// Per-product totals of the goods an invoice handed out.
#[derive(Debug, Clone, Default)]
struct SoldGoods {
    name: String,
    quantity: u64,
    gross: u64,
    discount: u64,
    cost: u64,
}

fn sold_goods(original: &InvoiceReadModel) -> BTreeMap<ProductId, SoldGoods> {
    let mut sold: BTreeMap<ProductId, SoldGoods> = BTreeMap::new();
    for line in original.lines.iter().filter(|l| l.direction == LineDirection::Out) {
        let slot = sold.entry(line.product_id).or_default();
        slot.name.clone_from(&line.product_name);
        slot.quantity += line.quantity;
        slot.gross += line.gross_amount();
        slot.discount += line.total_discount();
        slot.cost += line.cost_amount;
    }
    sold
}

/// Proportional share `part / whole` of `amount`, rounded down.
fn share(amount: u64, part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    (u128::from(amount) * u128::from(part) / u128::from(whole)) as u64
}

/// Incoming line priced the way the goods were sold: same unit price and cost,
/// and the per-unit share of every discount the customer got.
fn returned_line(
    product_id: ProductId,
    quantity: u64,
    sold: &SoldGoods,
) -> Result<LineInput, DomainError> {
    let unit_price = sold.gross / sold.quantity;
    let discount = share(sold.discount, quantity, sold.quantity);
    Ok(LineInput {
        product_id,
        product_name: sold.name.clone(),
        direction: LineDirection::In,
        quantity,
        unit_price,
        unit_cost: sold.cost / sold.quantity,
        discount: discount.min(line_amount(quantity, unit_price)?),
    })
}

fn merge(items: &[ReturnItem]) -> Result<BTreeMap<ProductId, u64>, WorkflowError> {
    let mut merged: BTreeMap<ProductId, u64> = BTreeMap::new();
    for item in items {
        if item.quantity == 0 {
            return Err(WorkflowError::Invalid("returned quantity must be positive".into()));
        }
        let slot = merged.entry(item.product_id).or_insert(0);
        *slot = slot
            .checked_add(item.quantity)
            .ok_or_else(|| WorkflowError::Invalid("returned quantity too large".into()))?;
    }
    Ok(merged)
}

fn quantities(map: &BTreeMap<ProductId, u64>) -> Vec<ReturnedQuantity> {
    map.iter()
        .map(|(product_id, quantity)| ReturnedQuantity {
            product_id: *product_id,
            quantity: *quantity,
        })
        .collect()
}

fn ledger_stream(_: TenantId, id: AggregateId) -> ReturnLedger {
    ReturnLedger::empty(ReturnLedgerId(id))
}

impl ShopServices {
    /// Take goods back against `original_invoice_id`, optionally handing out replacements.
    pub fn record_return(
        &self,
        tenant_id: TenantId,
        cashier: Option<UserId>,
        request: ReturnRequest,
        now: DateTime<Utc>,
    ) -> Result<Receipt, WorkflowError> {
        let _guard = self.lock();
        if request.returned.is_empty() {
            return Err(WorkflowError::Invalid("nothing to return".into()));
        }
        self.ensure_day_open(tenant_id, self.business_date(now))?;

        let original_id = request.original_invoice_id;
        let original = self.invoice(tenant_id, original_id)?;
        if original.status == InvoiceStatus::Void {
            return Err(WorkflowError::Rejected(format!(
                "invoice {original_id} is void"
            )));
        }
        if original.kind == InvoiceKind::Return {
            return Err(WorkflowError::Rejected(
                "goods can only be returned against a sale or an exchange".into(),
            ));
        }

        let kind = if request.replacements.is_empty() {
            ReturnKind::Return
        } else {
            ReturnKind::Exchange
        };
        let customer_id = original.customer_id;
        if let (ReturnKind::Exchange, Some(customer_id)) = (kind, customer_id) {
            self.ensure_customer_can_buy(tenant_id, customer_id)?;
        }

        let sold = sold_goods(&original);
        let returned = merge(&request.returned)?;
        let mut lines = Vec::new();
        for (product_id, quantity) in &returned {
            let goods = sold.get(product_id).ok_or_else(|| {
                WorkflowError::Rejected(format!(
                    "product {product_id} was not sold on invoice {original_id}"
                ))
            })?;
            lines.push(returned_line(*product_id, *quantity, goods)?);
        }
        let (replacement_lines, handed_out) = if request.replacements.is_empty() {
            (Vec::new(), BTreeMap::new())
        } else {
            self.sale_lines(tenant_id, &request.replacements)?
        };
        lines.extend(replacement_lines);

        let invoice_kind: InvoiceKind = kind.into();
        let (_, totals) = price_lines(&lines, 0, invoice_kind.primary_direction())?;
        let settled = if request.settle_now || customer_id.is_none() {
            totals.net_total
        } else {
            0
        };
        if let Some(customer_id) = customer_id {
            self.ensure_credit(tenant_id, customer_id, totals.net_total - settled)?;
        }

        let ledger_id = ReturnLedgerId::for_invoice(original_id);
        if self.hub().returns.get(tenant_id, &original_id).is_none() {
            let sold_quantities: Vec<ReturnedQuantity> = sold
                .iter()
                .map(|(product_id, goods)| ReturnedQuantity {
                    product_id: *product_id,
                    quantity: goods.quantity,
                })
                .collect();
            self.execute(
                tenant_id,
                ledger_id.0,
                LEDGER,
                ReturnLedgerCommand::OpenLedger(OpenLedger {
                    tenant_id,
                    original_invoice_id: original_id,
                    customer_id,
                    sold: sold_quantities,
                    occurred_at: now,
                }),
                ledger_stream,
            )?;
        }

        let document_id = InvoiceId::new(AggregateId::new());
        self.execute(
            tenant_id,
            ledger_id.0,
            LEDGER,
            ReturnLedgerCommand::RecordReturn(RecordReturn {
                tenant_id,
                original_invoice_id: original_id,
                document_invoice_id: document_id,
                kind,
                returned: quantities(&returned),
                replacements: quantities(&handed_out),
                occurred_at: now,
            }),
            ledger_stream,
        )?;

        self.execute(
            tenant_id,
            document_id.0,
            INVOICE,
            InvoiceCommand::IssueInvoice(IssueInvoice {
                tenant_id,
                invoice_id: document_id,
                kind: invoice_kind,
                customer_id,
                original_invoice_id: Some(original_id),
                lines,
                invoice_discount: 0,
                settled_amount: settled,
                issued_by: cashier,
                note: request.note,
                occurred_at: now,
            }),
            invoice_stream,
        )?;

        self.restock_goods(tenant_id, document_id, &returned, now)?;
        self.issue_goods(tenant_id, document_id, &handed_out, now)?;

        tracing::info!(
            %tenant_id,
            original_invoice_id = %original_id,
            document_invoice_id = %document_id,
            kind = invoice_kind.as_str(),
            net_total = totals.net_total,
            settled,
            "return recorded"
        );
        let tendered = settled.max(0).unsigned_abs();
        Ok(Receipt::new(self.invoice(tenant_id, document_id)?, tendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goods(quantity: u64, gross: u64, discount: u64, cost: u64) -> SoldGoods {
        SoldGoods {
            name: "Hand sprayer 5L".to_string(),
            quantity,
            gross,
            discount,
            cost,
        }
    }

    #[test]
    fn returned_line_carries_the_per_unit_discount_share() {
        let product = ProductId::new(AggregateId::new());
        let line = returned_line(product, 1, &goods(3, 3_000, 301, 1_800)).unwrap();

        assert_eq!(line.direction, LineDirection::In);
        assert_eq!(line.unit_price, 1_000);
        assert_eq!(line.unit_cost, 600);
        assert_eq!(line.discount, 100);
    }

    #[test]
    fn returning_everything_reverses_the_full_discount() {
        let product = ProductId::new(AggregateId::new());
        let line = returned_line(product, 3, &goods(3, 3_000, 301, 1_800)).unwrap();
        assert_eq!(line.discount, 301);
    }

    #[test]
    fn merge_sums_repeated_products_and_rejects_zero() {
        let product = ProductId::new(AggregateId::new());
        let merged = merge(&[
            ReturnItem { product_id: product, quantity: 1 },
            ReturnItem { product_id: product, quantity: 2 },
        ])
        .unwrap();
        assert_eq!(merged.get(&product), Some(&3));

        assert!(matches!(
            merge(&[ReturnItem { product_id: product, quantity: 0 }]),
            Err(WorkflowError::Invalid(_))
        ));
    }
}
