use chrono::{DateTime, Utc};

/// A fact recorded in an append-only stream.
///
/// Event types are dotted names (`invoicing.invoice.issued`) and each carries a
/// schema version so stored payloads can evolve.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time of the fact (drives the business date of a sale).
    fn occurred_at(&self) -> DateTime<Utc>;
}
