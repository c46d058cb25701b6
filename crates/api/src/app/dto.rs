//! Request/response shapes and path parsing.
//!
//! Write requests that map one-to-one onto a workflow input (checkout,
//! returns, new customer/product) deserialize straight into the infra types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use storeledger_core::AggregateId;
use storeledger_customers::CustomerId;
use storeledger_infra::projections::{CustomerBalance, CustomerReadModel, InvoiceReadModel};
use storeledger_invoicing::{InvoiceId, InvoiceKind, InvoiceStatus};
use storeledger_products::{ProductCategory, ProductId};

use crate::app::errors::{ApiError, ApiResult};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveStockRequest {
    pub quantity: u64,
    /// Defaults to the product's reference cost.
    #[serde(default)]
    pub unit_cost: Option<u64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    /// Positive when the customer pays, negative for a refund.
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReopenDayRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<ProductCategory>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceQuery {
    pub kind: Option<InvoiceKind>,
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub code: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Items<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: CustomerReadModel,
    pub balance: CustomerBalance,
}

#[derive(Debug, Serialize)]
pub struct InvoiceView {
    #[serde(flatten)]
    pub invoice: InvoiceReadModel,
    /// Returns and exchanges recorded against this invoice.
    pub related_documents: Vec<InvoiceId>,
}

// -------------------------
// Path parsing
// -------------------------

fn parse_aggregate(raw: &str, what: &str) -> ApiResult<AggregateId> {
    raw.parse::<AggregateId>()
        .map_err(|_| ApiError::BadRequest(format!("invalid {what} id `{raw}`")))
}

pub fn parse_customer_id(raw: &str) -> ApiResult<CustomerId> {
    parse_aggregate(raw, "customer").map(CustomerId::new)
}

pub fn parse_product_id(raw: &str) -> ApiResult<ProductId> {
    parse_aggregate(raw, "product").map(ProductId::new)
}

pub fn parse_invoice_id(raw: &str) -> ApiResult<InvoiceId> {
    parse_aggregate(raw, "invoice").map(InvoiceId::new)
}

/// Business date in `YYYY-MM-DD` form.
pub fn parse_date(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date `{raw}` (expected YYYY-MM-DD)")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_dates() {
        let id = AggregateId::new();
        assert_eq!(parse_product_id(&id.to_string()).unwrap(), ProductId::new(id));
        assert!(matches!(parse_invoice_id("nope"), Err(ApiError::BadRequest(_))));

        assert_eq!(
            parse_date("2026-05-04").unwrap(),
            NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
        );
        assert!(parse_date("04/05/2026").is_err());
    }
}
