use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use storeledger_events::Event;

use crate::snapshot::DailySnapshot;

pub const AGGREGATE_TYPE: &str = "closing.day";

/// Identifier of a day's closing stream, derived from the date.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyInventoryId(pub AggregateId);

impl DailyInventoryId {
    pub fn for_date(date: NaiveDate) -> Self {
        Self(AggregateId::derived(
            AGGREGATE_TYPE,
            date.format("%Y-%m-%d").to_string(),
        ))
    }
}

impl core::fmt::Display for DailyInventoryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Open,
    Closed,
    Reopened,
}

/// Aggregate root: the closing record of one business day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyInventory {
    id: DailyInventoryId,
    tenant_id: Option<TenantId>,
    business_date: Option<NaiveDate>,
    status: DayStatus,
    snapshot: Option<DailySnapshot>,
    closings: u32,
    version: u64,
}

impl DailyInventory {
    pub fn empty(id: DailyInventoryId) -> Self {
        Self {
            id,
            tenant_id: None,
            business_date: None,
            status: DayStatus::Open,
            snapshot: None,
            closings: 0,
            version: 0,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn business_date(&self) -> Option<NaiveDate> {
        self.business_date
    }

    pub fn status(&self) -> DayStatus {
        self.status
    }

    pub fn is_closed(&self) -> bool {
        self.status == DayStatus::Closed
    }

    /// Snapshot of the latest closing (kept after a reopen until replaced).
    pub fn snapshot(&self) -> Option<&DailySnapshot> {
        self.snapshot.as_ref()
    }

    /// How many times the day was closed.
    pub fn closings(&self) -> u32 {
        self.closings
    }
}

impl AggregateRoot for DailyInventory {
    type Id = DailyInventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseDay {
    pub tenant_id: TenantId,
    pub business_date: NaiveDate,
    pub snapshot: DailySnapshot,
    pub closed_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenDay {
    pub tenant_id: TenantId,
    pub business_date: NaiveDate,
    pub reason: String,
    pub reopened_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DailyInventoryCommand {
    CloseDay(CloseDay),
    ReopenDay(ReopenDay),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayClosed {
    pub tenant_id: TenantId,
    pub business_date: NaiveDate,
    pub snapshot: DailySnapshot,
    pub closed_by: Option<UserId>,
    /// 1 for the first closing, incremented by every re-close.
    pub closing_no: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayReopened {
    pub tenant_id: TenantId,
    pub business_date: NaiveDate,
    pub reason: String,
    pub reopened_by: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DailyInventoryEvent {
    DayClosed(DayClosed),
    DayReopened(DayReopened),
}

impl DailyInventoryEvent {
    pub fn business_date(&self) -> NaiveDate {
        match self {
            DailyInventoryEvent::DayClosed(e) => e.business_date,
            DailyInventoryEvent::DayReopened(e) => e.business_date,
        }
    }
}

impl Event for DailyInventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DailyInventoryEvent::DayClosed(_) => "closing.day.closed",
            DailyInventoryEvent::DayReopened(_) => "closing.day.reopened",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DailyInventoryEvent::DayClosed(e) => e.occurred_at,
            DailyInventoryEvent::DayReopened(e) => e.occurred_at,
        }
    }
}

impl Aggregate for DailyInventory {
    type Command = DailyInventoryCommand;
    type Event = DailyInventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DailyInventoryEvent::DayClosed(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.business_date = Some(e.business_date);
                self.snapshot = Some(e.snapshot.clone());
                self.closings = e.closing_no;
                self.status = DayStatus::Closed;
            }
            DailyInventoryEvent::DayReopened(_) => {
                self.status = DayStatus::Reopened;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DailyInventoryCommand::CloseDay(cmd) => self.handle_close(cmd),
            DailyInventoryCommand::ReopenDay(cmd) => self.handle_reopen(cmd),
        }
    }
}

impl DailyInventory {
    fn ensure_scope(&self, tenant_id: TenantId, date: NaiveDate) -> Result<(), DomainError> {
        if DailyInventoryId::for_date(date) != self.id {
            return Err(DomainError::invariant("closing id does not match business date"));
        }
        if self.tenant_id.is_some_and(|t| t != tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn handle_close(&self, cmd: &CloseDay) -> Result<Vec<DailyInventoryEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.business_date)?;

        if self.is_closed() {
            return Err(DomainError::conflict(format!(
                "{} is already closed",
                cmd.business_date
            )));
        }
        if cmd.snapshot.business_date != cmd.business_date {
            return Err(DomainError::invariant(format!(
                "snapshot of {} cannot close {}",
                cmd.snapshot.business_date, cmd.business_date
            )));
        }

        Ok(vec![DailyInventoryEvent::DayClosed(DayClosed {
            tenant_id: cmd.tenant_id,
            business_date: cmd.business_date,
            snapshot: cmd.snapshot.clone(),
            closed_by: cmd.closed_by,
            closing_no: self.closings + 1,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reopen(&self, cmd: &ReopenDay) -> Result<Vec<DailyInventoryEvent>, DomainError> {
        self.ensure_scope(cmd.tenant_id, cmd.business_date)?;

        if !self.is_closed() {
            return Err(DomainError::invariant(format!(
                "{} is not closed",
                cmd.business_date
            )));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a reason is required to reopen a day"));
        }

        Ok(vec![DailyInventoryEvent::DayReopened(DayReopened {
            tenant_id: cmd.tenant_id,
            business_date: cmd.business_date,
            reason: cmd.reason.trim().to_string(),
            reopened_by: cmd.reopened_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
