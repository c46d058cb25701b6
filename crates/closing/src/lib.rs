//! Daily inventory closing.
//!
//! Turns a business day's customer transactions and the shelf stock into a
//! snapshot of totals, per-product and per-customer summaries and running
//! totals, and records that snapshot on a per-day aggregate.

pub mod calendar;
pub mod day;
pub mod snapshot;
pub mod transaction;

pub use calendar::{business_date, day_bounds};
pub use day::{
    CloseDay, DailyInventory, DailyInventoryCommand, DailyInventoryEvent, DailyInventoryId,
    DayClosed, DayReopened, DayStatus, ReopenDay,
};
pub use snapshot::{
    CustomerDaySummary, DailySnapshot, DailyTotals, DayInput, ProductDaySummary, RunningTotals,
    StockPosition, VoidedInvoice, WALK_IN, summarize_day,
};
pub use transaction::{
    CustomerTransaction, TransactionKind, settlement_transaction, transactions_for_invoice,
};
