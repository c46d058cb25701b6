//! Invoicing domain module (event-sourced).
//!
//! One invoice aggregate covers sales, returns and exchanges. Lines carry a
//! direction (goods leaving or coming back), so a single signed net total
//! tells whether the customer owes the shop or the shop owes the customer.

pub mod invoice;
pub mod pricing;

pub use invoice::{
    Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceKind, InvoiceStatus,
    InvoiceVoided, IssueInvoice, PaymentRegistered, RegisterPayment, VoidInvoice,
};
pub use pricing::{InvoiceLine, InvoiceTotals, LineDirection, LineInput, price_lines};
