use std::sync::Arc;

use chrono::FixedOffset;
use serde_json::Value as JsonValue;

use storeledger_core::TenantId;
use storeledger_events::EventEnvelope;

use super::{
    CustomerBalancesProjection, CustomerDirectoryProjection, CustomerTransactionsProjection,
    DailyInventoryProjection, InvoicesProjection, ProductCatalogProjection, Projection,
    ProjectionError, ReturnLedgersProjection, StockLevelsProjection,
};
use crate::read_model::InMemoryTenantStore;

/// Every shop read model, with envelopes routed by aggregate type.
#[derive(Debug, Clone)]
pub struct ProjectionHub {
    pub customers: Arc<CustomerDirectoryProjection>,
    pub products: Arc<ProductCatalogProjection>,
    pub stock: Arc<StockLevelsProjection>,
    pub invoices: Arc<InvoicesProjection>,
    pub transactions: Arc<CustomerTransactionsProjection>,
    pub balances: Arc<CustomerBalancesProjection>,
    pub returns: Arc<ReturnLedgersProjection>,
    pub days: Arc<DailyInventoryProjection>,
}

impl ProjectionHub {
    /// In-memory read models; `offset` decides which business day an invoice lands on.
    pub fn in_memory(offset: FixedOffset) -> Self {
        Self {
            customers: Arc::new(CustomerDirectoryProjection::new(InMemoryTenantStore::new())),
            products: Arc::new(ProductCatalogProjection::new(InMemoryTenantStore::new())),
            stock: Arc::new(StockLevelsProjection::new(InMemoryTenantStore::new())),
            invoices: Arc::new(InvoicesProjection::new(InMemoryTenantStore::new(), offset)),
            transactions: Arc::new(CustomerTransactionsProjection::new(
                InMemoryTenantStore::new(),
                offset,
            )),
            balances: Arc::new(CustomerBalancesProjection::new(InMemoryTenantStore::new())),
            returns: Arc::new(ReturnLedgersProjection::new(InMemoryTenantStore::new())),
            days: Arc::new(DailyInventoryProjection::new(InMemoryTenantStore::new())),
        }
    }

    fn all(&self) -> [&dyn Projection; 8] {
        [
            self.customers.as_ref(),
            self.products.as_ref(),
            self.stock.as_ref(),
            self.invoices.as_ref(),
            self.transactions.as_ref(),
            self.balances.as_ref(),
            self.returns.as_ref(),
            self.days.as_ref(),
        ]
    }

    /// Apply one committed envelope to the read models that follow its aggregate type.
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            storeledger_customers::customer::AGGREGATE_TYPE => {
                self.customers.apply_envelope(envelope)
            }
            storeledger_products::product::AGGREGATE_TYPE => self.products.apply_envelope(envelope),
            storeledger_inventory::stock::AGGREGATE_TYPE => self.stock.apply_envelope(envelope),
            storeledger_invoicing::invoice::AGGREGATE_TYPE => {
                let followers: [&dyn Projection; 3] = [
                    self.invoices.as_ref(),
                    self.transactions.as_ref(),
                    self.balances.as_ref(),
                ];
                apply_each(&followers, envelope)
            }
            storeledger_returns::ledger::AGGREGATE_TYPE => self.returns.apply_envelope(envelope),
            storeledger_closing::day::AGGREGATE_TYPE => self.days.apply_envelope(envelope),
            other => {
                tracing::debug!(aggregate_type = other, "no projection follows this stream");
                Ok(())
            }
        }
    }

    pub fn reset_tenant(&self, tenant_id: TenantId) {
        for projection in self.all() {
            tracing::debug!(projection = projection.name(), %tenant_id, "resetting read model");
            projection.reset_tenant(tenant_id);
        }
    }
}

/// Every follower sees the envelope even when one of them refuses it; the
/// first refusal is reported.
fn apply_each(
    followers: &[&dyn Projection],
    envelope: &EventEnvelope<JsonValue>,
) -> Result<(), ProjectionError> {
    let mut first = None;
    for projection in followers {
        if let Err(e) = projection.apply_envelope(envelope) {
            tracing::warn!(
                projection = projection.name(),
                error = %e,
                "read model refused event"
            );
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use uuid::Uuid;

    use storeledger_core::AggregateId;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        refuse: bool,
        seen: Mutex<Vec<u64>>,
    }

    impl Projection for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn apply_envelope(
            &self,
            envelope: &EventEnvelope<JsonValue>,
        ) -> Result<(), ProjectionError> {
            self.seen.lock().unwrap().push(envelope.sequence_number());
            if self.refuse {
                return Err(ProjectionError::NonMonotonicSequence {
                    last: 0,
                    found: envelope.sequence_number(),
                });
            }
            Ok(())
        }

        fn reset_tenant(&self, _: TenantId) {}
    }

    #[test]
    fn a_refusing_follower_does_not_starve_the_others() {
        let refusing = Recorder {
            refuse: true,
            ..Recorder::default()
        };
        let after = Recorder::default();
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            TenantId::new(),
            AggregateId::new(),
            storeledger_invoicing::invoice::AGGREGATE_TYPE,
            1,
            json!({}),
        );

        let followers: [&dyn Projection; 2] = [&refusing, &after];
        let result = apply_each(&followers, &envelope);

        assert!(matches!(
            result,
            Err(ProjectionError::NonMonotonicSequence { found: 1, .. })
        ));
        assert_eq!(*after.seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn unknown_streams_are_ignored() {
        let hub = ProjectionHub::in_memory(FixedOffset::east_opt(0).unwrap());
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            TenantId::new(),
            AggregateId::new(),
            "supplier",
            1,
            json!({}),
        );
        assert!(hub.apply(&envelope).is_ok());
    }
}
