//! Projections: read models built from committed events.
//!
//! Every projection is:
//! - **Rebuildable**: cleared per tenant and replayed from the store
//! - **Tenant-isolated**: rows are partitioned by tenant, payload tenants are checked
//! - **Idempotent**: a per-stream cursor skips envelopes it has already applied

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use storeledger_core::{AggregateId, TenantId};
use storeledger_events::EventEnvelope;

pub mod cursor;
pub mod customer_balances;
pub mod customer_transactions;
pub mod customers;
pub mod daily_inventory;
pub mod hub;
pub mod invoices;
pub mod products;
pub mod return_ledgers;
pub mod stock_levels;

pub use customer_balances::{CustomerBalance, CustomerBalancesProjection};
pub use customer_transactions::{CustomerTransactionsProjection, InvoiceTransactions};
pub use customers::{CustomerDirectoryProjection, CustomerReadModel};
pub use daily_inventory::{DailyInventoryProjection, DailyInventoryReadModel};
pub use hub::ProjectionHub;
pub use invoices::{InvoiceFilter, InvoiceReadModel, InvoicesProjection, PaymentRecord};
pub use products::{ProductCatalogProjection, ProductReadModel};
pub use return_ledgers::{ReturnLedgerReadModel, ReturnLedgersProjection, ReturnableProduct};
pub use stock_levels::{MovementKind, StockLevel, StockLevelsProjection, StockMovement};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: &'static str,
        message: String,
    },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// A read model fed from the event stream.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply one committed envelope; envelopes of other aggregate types are ignored.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop every row and cursor of a tenant before a replay.
    fn reset_tenant(&self, tenant_id: TenantId);
}

pub(crate) fn decode<E: DeserializeOwned>(
    envelope: &EventEnvelope<JsonValue>,
    aggregate_type: &'static str,
) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        aggregate_type,
        message: e.to_string(),
    })
}

/// The payload must belong to the envelope's tenant and stream.
pub(crate) fn check_scope(
    envelope: &EventEnvelope<JsonValue>,
    event_tenant: TenantId,
    event_aggregate: AggregateId,
) -> Result<(), ProjectionError> {
    if event_tenant != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if event_aggregate != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event stream does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(())
}
