//! Shop application services: one dispatcher, one projection hub.
//!
//! Writes are serialized by a single lock. Each committed event is applied to
//! the read models before the write returns, so a workflow always validates
//! against state that includes its own earlier dispatches. The bus still
//! carries every envelope for realtime consumers.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use storeledger_core::{Aggregate, AggregateId, DomainError, TenantId};
use storeledger_events::{EventEnvelope, InMemoryEventBus};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use crate::projections::{ProjectionError, ProjectionHub};
use crate::workflows::WorkflowError;

pub type ShopBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type ShopDispatcher = CommandDispatcher<Arc<dyn EventStore>, ShopBus>;

pub struct ShopServices {
    dispatcher: ShopDispatcher,
    hub: ProjectionHub,
    offset: FixedOffset,
    write_lock: Mutex<()>,
}

impl ShopServices {
    pub fn new(store: Arc<dyn EventStore>, bus: ShopBus, offset: FixedOffset) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            hub: ProjectionHub::in_memory(offset),
            offset,
            write_lock: Mutex::new(()),
        }
    }

    /// Everything in process memory (dev and tests).
    pub fn in_memory(offset: FixedOffset) -> Self {
        Self::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
            offset,
        )
    }

    pub fn hub(&self) -> &ProjectionHub {
        &self.hub
    }

    pub fn bus(&self) -> &ShopBus {
        self.dispatcher.bus()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Business day `at` falls on in the shop's time zone.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        storeledger_closing::business_date(at, self.offset)
    }

    /// Replay the whole store into empty read models. Returns the number of events applied.
    pub fn rebuild(&self) -> Result<usize, WorkflowError> {
        let _guard = self.lock();
        let events = self.dispatcher.store().load_all()?;

        let tenants: BTreeSet<TenantId> = events.iter().map(|e| e.tenant_id).collect();
        self.replay(&tenants, &events)?;

        tracing::info!(
            events = events.len(),
            tenants = tenants.len(),
            "read models rebuilt from event store"
        );
        Ok(events.len())
    }

    fn replay(
        &self,
        tenants: &BTreeSet<TenantId>,
        events: &[StoredEvent],
    ) -> Result<(), ProjectionError> {
        for tenant_id in tenants {
            self.hub.reset_tenant(*tenant_id);
        }
        for stored in events {
            self.hub.apply(&stored.to_envelope())?;
        }
        Ok(())
    }

    /// Replay one tenant's streams into empty read models. Callers hold the write lock.
    fn rebuild_tenant(&self, tenant_id: TenantId) -> Result<usize, WorkflowError> {
        let events: Vec<StoredEvent> = self
            .dispatcher
            .store()
            .load_all()?
            .into_iter()
            .filter(|e| e.tenant_id == tenant_id)
            .collect();
        self.replay(&BTreeSet::from([tenant_id]), &events)?;
        Ok(events.len())
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Dispatch one command and fold what was committed into the read models.
    ///
    /// A read model that cannot take the new events is rebuilt for the tenant
    /// from the store; if that fails too the write reports the projection error.
    /// Callers hold the write lock.
    pub(crate) fn execute<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, WorkflowError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storeledger_events::Event + Serialize + DeserializeOwned,
    {
        let committed = self.dispatcher.dispatch(
            tenant_id,
            aggregate_id,
            aggregate_type,
            command,
            make_aggregate,
        )?;

        let applied = committed
            .iter()
            .try_for_each(|stored| self.hub.apply(&stored.to_envelope()));
        if let Err(e) = applied {
            tracing::warn!(
                error = %e,
                %tenant_id,
                aggregate_type,
                %aggregate_id,
                "read model update failed; rebuilding tenant from the event store"
            );
            match self.rebuild_tenant(tenant_id) {
                Ok(events) => {
                    tracing::info!(%tenant_id, events, "tenant read models rebuilt");
                }
                Err(rebuild) => {
                    tracing::error!(error = %rebuild, %tenant_id, "tenant rebuild failed");
                    return Err(WorkflowError::Projection(e));
                }
            }
        }
        Ok(committed)
    }

    /// Refuse writes dated on or before the latest closed business day.
    pub(crate) fn ensure_day_open(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
    ) -> Result<(), WorkflowError> {
        match self.hub.days.latest_closed_date(tenant_id) {
            Some(closed) if date <= closed => Err(WorkflowError::Rejected(format!(
                "business day {date} is closed (latest closed day is {closed})"
            ))),
            _ => Ok(()),
        }
    }
}
