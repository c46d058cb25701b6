//! Shop workflows: multi-aggregate use cases on top of [`ShopServices`].
//!
//! Every public workflow takes the write lock, validates against the read
//! models, then dispatches. There is no cross-aggregate transaction; each
//! workflow orders its dispatches so that the one most likely to be refused
//! goes first.
//!
//! [`ShopServices`]: crate::services::ShopServices

pub mod checkout;
pub mod daily_closing;
pub mod error;
pub mod records;
pub mod returns;
pub mod void;

pub use checkout::{CheckoutItem, CheckoutRequest, Receipt};
pub use error::WorkflowError;
pub use records::{CustomerChanges, NewCustomer, NewProduct};
pub use returns::{ReturnItem, ReturnRequest};
