use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value as JsonValue;

use storeledger_core::{AggregateId, TenantId};
use storeledger_events::EventEnvelope;

use super::ProjectionError;

/// Last applied sequence number per `(tenant, aggregate)` stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<(TenantId, AggregateId), u64>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<(TenantId, AggregateId), u64>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn last(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.read().get(&(tenant_id, aggregate_id)).copied().unwrap_or(0)
    }

    /// `Ok(true)` when the envelope is next in its stream, `Ok(false)` when it
    /// was already applied. A stream starts at sequence 1.
    pub fn admit(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let last = self.last(envelope.tenant_id(), envelope.aggregate_id());
        let seq = envelope.sequence_number();
        if seq != 0 && seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        self.write().insert(
            (envelope.tenant_id(), envelope.aggregate_id()),
            envelope.sequence_number(),
        );
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        self.write().retain(|(t, _), _| *t != tenant_id);
    }
}
