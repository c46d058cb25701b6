//! Return and exchange tracking.
//!
//! Each sold invoice gets a ledger that links every later return or exchange
//! document back to it and guards the quantities that may still come back.

pub mod ledger;

pub use ledger::{
    LedgerOpened, OpenLedger, RecordReturn, ReturnEntry, ReturnKind, ReturnLedger,
    ReturnLedgerCommand, ReturnLedgerEvent, ReturnLedgerId, ReturnRecorded, ReturnedQuantity,
};
