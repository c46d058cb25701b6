//! Customer transactions: the line-level rows a closing aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storeledger_customers::CustomerId;
use storeledger_invoicing::{InvoiceId, InvoiceIssued, InvoiceKind, LineDirection};
use storeledger_products::ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Goods handed to the customer.
    Purchase,
    /// Goods brought back by the customer.
    Return,
    /// Money received from the customer.
    Payment,
    /// Money handed back to the customer.
    Refund,
}

/// One purchase, return, payment or refund row.
///
/// Amounts are magnitudes; `kind` gives the direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerTransaction {
    pub business_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
    pub invoice_id: InvoiceId,
    pub invoice_kind: InvoiceKind,
    pub customer_id: Option<CustomerId>,
    pub kind: TransactionKind,
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub quantity: u64,
    /// Net of every discount for goods rows; the money moved for settlements.
    pub amount: u64,
    pub cost: u64,
    pub discount: u64,
}

/// Rows produced by an issued invoice: one per line, plus the counter settlement.
pub fn transactions_for_invoice(
    issued: &InvoiceIssued,
    business_date: NaiveDate,
) -> Vec<CustomerTransaction> {
    let mut rows: Vec<CustomerTransaction> = issued
        .lines
        .iter()
        .map(|line| CustomerTransaction {
            business_date,
            occurred_at: issued.occurred_at,
            invoice_id: issued.invoice_id,
            invoice_kind: issued.kind,
            customer_id: issued.customer_id,
            kind: match line.direction {
                LineDirection::Out => TransactionKind::Purchase,
                LineDirection::In => TransactionKind::Return,
            },
            product_id: Some(line.product_id),
            product_name: Some(line.product_name.clone()),
            quantity: line.quantity,
            amount: line.net_amount,
            cost: line.cost_amount,
            discount: line.total_discount(),
        })
        .collect();

    rows.extend(settlement_transaction(
        issued.invoice_id,
        issued.kind,
        issued.customer_id,
        issued.settled_amount,
        issued.occurred_at,
        business_date,
    ));
    rows
}

/// Payment (positive) or refund (negative) row; `None` for a zero amount.
pub fn settlement_transaction(
    invoice_id: InvoiceId,
    invoice_kind: InvoiceKind,
    customer_id: Option<CustomerId>,
    amount: i64,
    occurred_at: DateTime<Utc>,
    business_date: NaiveDate,
) -> Option<CustomerTransaction> {
    if amount == 0 {
        return None;
    }
    Some(CustomerTransaction {
        business_date,
        occurred_at,
        invoice_id,
        invoice_kind,
        customer_id,
        kind: if amount > 0 {
            TransactionKind::Payment
        } else {
            TransactionKind::Refund
        },
        product_id: None,
        product_name: None,
        quantity: 0,
        amount: amount.unsigned_abs(),
        cost: 0,
        discount: 0,
    })
}
