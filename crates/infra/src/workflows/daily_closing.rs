//! Daily inventory closing.
//!
//! Days close in order. A day may be closed once everything before it is
//! closed; only the latest closed day can be reopened, and it must be closed
//! again before any later day.

use chrono::{DateTime, NaiveDate, Utc};

use storeledger_closing::day::AGGREGATE_TYPE as DAY;
use storeledger_closing::{
    CloseDay, DailyInventory, DailyInventoryCommand, DailyInventoryId, DailySnapshot, DayInput,
    ReopenDay, day_bounds, summarize_day,
};
use storeledger_core::{AggregateId, TenantId, UserId};

use super::WorkflowError;
use crate::projections::DailyInventoryReadModel;
use crate::services::ShopServices;

fn day_stream(_: TenantId, id: AggregateId) -> DailyInventory {
    DailyInventory::empty(DailyInventoryId(id))
}

impl ShopServices {
    /// The snapshot closing `date` now would record, without recording it.
    pub fn preview_day(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailySnapshot, WorkflowError> {
        let _guard = self.lock();
        self.ensure_not_future(date, now)?;
        self.snapshot(tenant_id, date)
    }

    pub fn close_day(
        &self,
        tenant_id: TenantId,
        closed_by: Option<UserId>,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyInventoryReadModel, WorkflowError> {
        let _guard = self.lock();
        self.ensure_not_future(date, now)?;

        let days = &self.hub().days;
        let latest = days.latest_closed_date(tenant_id);
        if let Some(latest) = latest {
            if date < latest {
                return Err(WorkflowError::Rejected(format!(
                    "{date} is before the latest closed day {latest}"
                )));
            }
        }
        if let Some(reopened) = days.reopened_before(tenant_id, date) {
            return Err(WorkflowError::Rejected(format!(
                "{reopened} was reopened and must be closed first"
            )));
        }
        let skipped = self
            .hub()
            .transactions
            .active_dates(tenant_id)
            .into_iter()
            .find(|d| *d < date && latest.is_none_or(|l| *d > l));
        if let Some(skipped) = skipped {
            return Err(WorkflowError::Rejected(format!(
                "{skipped} has activity and must be closed before {date}"
            )));
        }

        let snapshot = self.snapshot(tenant_id, date)?;
        let totals = snapshot.totals;
        self.execute(
            tenant_id,
            DailyInventoryId::for_date(date).0,
            DAY,
            DailyInventoryCommand::CloseDay(CloseDay {
                tenant_id,
                business_date: date,
                snapshot,
                closed_by,
                occurred_at: now,
            }),
            day_stream,
        )?;

        tracing::info!(
            %tenant_id,
            business_date = %date,
            net_sales = totals.net_sales,
            profit = totals.profit,
            invoices = totals.invoice_count,
            "business day closed"
        );
        self.closed_day(tenant_id, date)
    }

    pub fn reopen_day(
        &self,
        tenant_id: TenantId,
        reopened_by: Option<UserId>,
        date: NaiveDate,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<DailyInventoryReadModel, WorkflowError> {
        let _guard = self.lock();
        match self.hub().days.latest_closed_date(tenant_id) {
            Some(latest) if latest == date => {}
            Some(latest) => {
                return Err(WorkflowError::Rejected(format!(
                    "only the latest closed day ({latest}) can be reopened"
                )));
            }
            None => return Err(WorkflowError::Rejected("no day is closed".into())),
        }

        self.execute(
            tenant_id,
            DailyInventoryId::for_date(date).0,
            DAY,
            DailyInventoryCommand::ReopenDay(ReopenDay {
                tenant_id,
                business_date: date,
                reason,
                reopened_by,
                occurred_at: now,
            }),
            day_stream,
        )?;

        tracing::warn!(%tenant_id, business_date = %date, "business day reopened");
        self.closed_day(tenant_id, date)
    }

    fn ensure_not_future(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        let today = self.business_date(now);
        if date > today {
            return Err(WorkflowError::Invalid(format!(
                "{date} is in the future (today is {today})"
            )));
        }
        Ok(())
    }

    fn snapshot(&self, tenant_id: TenantId, date: NaiveDate) -> Result<DailySnapshot, WorkflowError> {
        let hub = self.hub();
        let (_, end) = day_bounds(date, self.offset());
        let transactions = hub.transactions.for_day(tenant_id, date);
        let stock = hub.stock.positions_at(tenant_id, end);
        let voided = hub.transactions.voided_on(tenant_id, date);
        let names = hub.customers.names(tenant_id);
        let previous = hub.days.running_before(tenant_id, date);

        Ok(summarize_day(DayInput {
            business_date: date,
            transactions: &transactions,
            stock: &stock,
            voided: &voided,
            customer_names: &names,
            previous: previous.as_ref(),
        })?)
    }

    fn closed_day(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
    ) -> Result<DailyInventoryReadModel, WorkflowError> {
        self.hub()
            .days
            .get(tenant_id, date)
            .ok_or_else(|| WorkflowError::NotFound(format!("closing of {date}")))
    }
}
