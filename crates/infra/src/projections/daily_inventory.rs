use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_closing::day::AGGREGATE_TYPE;
use storeledger_closing::{
    DailyInventoryEvent, DailyInventoryId, DailySnapshot, DayStatus, RunningTotals,
};
use storeledger_core::{TenantId, UserId};
use storeledger_events::EventEnvelope;

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Latest closing of a business day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyInventoryReadModel {
    pub business_date: NaiveDate,
    pub status: DayStatus,
    pub closings: u32,
    pub snapshot: DailySnapshot,
    pub closed_at: DateTime<Utc>,
    pub closed_by: Option<UserId>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub reopen_reason: Option<String>,
}

#[derive(Debug)]
pub struct DailyInventoryProjection<S = InMemoryTenantStore<NaiveDate, DailyInventoryReadModel>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> DailyInventoryProjection<S>
where
    S: TenantStore<NaiveDate, DailyInventoryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, date: NaiveDate) -> Option<DailyInventoryReadModel> {
        self.store.get(tenant_id, &date)
    }

    /// Every day ever closed, newest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<DailyInventoryReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| b.business_date.cmp(&a.business_date));
        rows
    }

    /// Latest business date currently in `Closed` status.
    pub fn latest_closed_date(&self, tenant_id: TenantId) -> Option<NaiveDate> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|d| d.status == DayStatus::Closed)
            .map(|d| d.business_date)
            .max()
    }

    /// Running totals of the latest closed day before `date`.
    pub fn running_before(&self, tenant_id: TenantId, date: NaiveDate) -> Option<RunningTotals> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|d| d.status == DayStatus::Closed && d.business_date < date)
            .max_by_key(|d| d.business_date)
            .map(|d| d.snapshot.running)
    }

    /// Earliest reopened day before `date`, which must be closed again first.
    pub fn reopened_before(&self, tenant_id: TenantId, date: NaiveDate) -> Option<NaiveDate> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|d| d.status == DayStatus::Reopened && d.business_date < date)
            .map(|d| d.business_date)
            .min()
    }
}

impl<S> Projection for DailyInventoryProjection<S>
where
    S: TenantStore<NaiveDate, DailyInventoryReadModel>,
{
    fn name(&self) -> &'static str {
        "closing.daily_inventory"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: DailyInventoryEvent = decode(envelope, AGGREGATE_TYPE)?;
        let date = ev.business_date();
        let tenant_id = match &ev {
            DailyInventoryEvent::DayClosed(e) => e.tenant_id,
            DailyInventoryEvent::DayReopened(e) => e.tenant_id,
        };
        check_scope(envelope, tenant_id, DailyInventoryId::for_date(date).0)?;

        match ev {
            DailyInventoryEvent::DayClosed(e) => {
                self.store.upsert(
                    tenant_id,
                    date,
                    DailyInventoryReadModel {
                        business_date: date,
                        status: DayStatus::Closed,
                        closings: e.closing_no,
                        snapshot: e.snapshot,
                        closed_at: e.occurred_at,
                        closed_by: e.closed_by,
                        reopened_at: None,
                        reopen_reason: None,
                    },
                );
            }
            DailyInventoryEvent::DayReopened(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &date) {
                    row.status = DayStatus::Reopened;
                    row.reopened_at = Some(e.occurred_at);
                    row.reopen_reason = Some(e.reason);
                    self.store.upsert(tenant_id, date, row);
                }
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
