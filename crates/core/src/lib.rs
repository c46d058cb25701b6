//! `storeledger-core`: domain building blocks shared by every shop module.
//!
//! Pure domain primitives only: identifiers, the domain error model, the
//! aggregate contract and integer money helpers. No IO lives here.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
