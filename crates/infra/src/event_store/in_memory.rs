use std::collections::HashMap;
use std::sync::RwLock;

use storeledger_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, batch_stream};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamKey, Vec<StoredEvent>>,
    /// Commit order across all streams.
    log: Vec<StreamKeyAt>,
}

#[derive(Debug, Copy, Clone)]
struct StreamKeyAt {
    key: StreamKey,
    index: usize,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some((tenant_id, aggregate_id, aggregate_type)) = batch_stream(&events)? else {
            return Ok(vec![]);
        };

        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;
        let Inner { streams, log } = &mut *inner;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            log.push(StreamKeyAt {
                key,
                index: stream.len(),
            });
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };

        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        Ok(inner.streams.get(&key).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        Ok(inner
            .log
            .iter()
            .filter_map(|at| inner.streams.get(&at.key).and_then(|s| s.get(at.index)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.thing.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn assigns_sequence_numbers_and_checks_expected_version() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        let first = store
            .append(
                vec![event(tenant, agg, "test.thing"), event(tenant, agg, "test.thing")],
                ExpectedVersion::Exact(0),
            )
            .unwrap();
        assert_eq!(
            first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let stale = store.append(vec![event(tenant, agg, "test.thing")], ExpectedVersion::Exact(1));
        assert!(matches!(stale, Err(EventStoreError::Concurrency(_))));

        let third = store
            .append(vec![event(tenant, agg, "test.thing")], ExpectedVersion::Exact(2))
            .unwrap();
        assert_eq!(third[0].sequence_number, 3);
    }

    #[test]
    fn streams_are_tenant_scoped() {
        let store = InMemoryEventStore::new();
        let agg = AggregateId::new();
        let a = TenantId::new();
        let b = TenantId::new();

        store
            .append(vec![event(a, agg, "test.thing")], ExpectedVersion::Any)
            .unwrap();

        assert_eq!(store.load_stream(a, agg).unwrap().len(), 1);
        assert!(store.load_stream(b, agg).unwrap().is_empty());
    }

    #[test]
    fn rejects_mixed_batches_and_type_changes() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        let mixed = store.append(
            vec![event(tenant, agg, "test.thing"), event(TenantId::new(), agg, "test.thing")],
            ExpectedVersion::Any,
        );
        assert!(matches!(mixed, Err(EventStoreError::TenantIsolation(_))));

        store
            .append(vec![event(tenant, agg, "test.thing")], ExpectedVersion::Any)
            .unwrap();
        let retyped = store.append(vec![event(tenant, agg, "test.other")], ExpectedVersion::Any);
        assert!(matches!(retyped, Err(EventStoreError::AggregateTypeMismatch(_))));
    }

    #[test]
    fn load_all_returns_commit_order_across_streams() {
        let store = InMemoryEventStore::new();
        let tenant = TenantId::new();
        let x = AggregateId::new();
        let y = AggregateId::new();

        store.append(vec![event(tenant, x, "test.thing")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(tenant, y, "test.thing")], ExpectedVersion::Any).unwrap();
        store.append(vec![event(tenant, x, "test.thing")], ExpectedVersion::Any).unwrap();

        let order: Vec<_> = store
            .load_all()
            .unwrap()
            .into_iter()
            .map(|e| (e.aggregate_id, e.sequence_number))
            .collect();
        assert_eq!(order, vec![(x, 1), (y, 1), (x, 2)]);
    }
}
