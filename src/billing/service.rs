use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::cache::{cache_key, BillingStatusCache};
use super::error::{BillingError, BillingResult};
use super::evaluator::evaluate;
use super::models::{BillingSchedule, BillingStatus, ScheduleUpdate};
use super::rollover;
use super::store::ScheduleStore;

/// key: billing-status-service -> cache-aside status checks + invalidating mutations
///
/// Every mutation invalidates the tenant's cached status before it returns,
/// so the next check after a successful write always recomputes.
#[derive(Clone)]
pub struct BillingStatusService {
    store: Arc<dyn ScheduleStore>,
    cache: Arc<BillingStatusCache>,
}

impl BillingStatusService {
    pub fn new(store: Arc<dyn ScheduleStore>, cache: Arc<BillingStatusCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<BillingStatusCache> {
        &self.cache
    }

    pub async fn check_status(&self, tenant_id: &str) -> BillingResult<BillingStatus> {
        self.check_status_at(tenant_id, Utc::now()).await
    }

    pub async fn check_status_at(
        &self,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> BillingResult<BillingStatus> {
        let tenant_id = require_id(tenant_id, "tenant id")?;
        let key = cache_key(tenant_id);

        if let Some(status) = self.cache.get(&key) {
            debug!(tenant_id, "billing status cache hit");
            return Ok(status);
        }
        let generation = self.cache.generation(&key);

        let schedules = self
            .store
            .load_active_schedules(tenant_id)
            .await
            .map_err(|err| {
                warn!(?err, tenant_id, "failed to load billing schedules");
                BillingError::Upstream(err)
            })?;

        let status = evaluate(&schedules, now);
        debug!(
            tenant_id,
            schedules = schedules.len(),
            overdue = status.overdue_schedules.len(),
            days_overdue = status.days_overdue,
            "billing status recomputed"
        );
        self.cache.set_if_generation(key, status.clone(), generation);
        Ok(status)
    }

    pub fn invalidate(&self, tenant_id: &str) -> BillingResult<()> {
        let tenant_id = require_id(tenant_id, "tenant id")?;
        self.cache.invalidate(&cache_key(tenant_id));
        info!(tenant_id, "billing status cache invalidated");
        Ok(())
    }

    /// Records a payment for one period of the schedule and rolls it over.
    pub async fn settle_payment(
        &self,
        tenant_id: &str,
        schedule_id: &str,
        paid_at: DateTime<Utc>,
    ) -> BillingResult<BillingSchedule> {
        let schedule = self.find_schedule(tenant_id, schedule_id).await?;
        if !schedule.is_active() {
            return Err(BillingError::Validation(format!(
                "billing schedule {} is not active",
                schedule.id
            )));
        }

        let settled = rollover::settle(&schedule);
        let recorded = self
            .store
            .record_settlement(&schedule, &settled, schedule.amount, paid_at)
            .await
            .map_err(BillingError::Upstream)?;
        if !recorded {
            warn!(
                tenant_id = %schedule.tenant_id,
                schedule_id = %schedule.id,
                "billing schedule changed during settlement"
            );
            return Err(BillingError::Conflict(format!(
                "billing schedule {} changed while settling; reload and retry",
                schedule.id
            )));
        }
        self.cache.invalidate(&cache_key(&settled.tenant_id));

        info!(
            tenant_id = %settled.tenant_id,
            schedule_id = %settled.id,
            amount = %schedule.amount,
            next_due_date = %settled.next_due_date,
            status = %settled.status,
            "billing payment settled"
        );
        Ok(settled)
    }

    pub async fn update_schedule(
        &self,
        tenant_id: &str,
        schedule_id: &str,
        update: ScheduleUpdate,
    ) -> BillingResult<BillingSchedule> {
        if update.is_empty() {
            return Err(BillingError::Validation(
                "update must set nextDueDate or status".into(),
            ));
        }
        let mut schedule = self.find_schedule(tenant_id, schedule_id).await?;
        if let Some(next_due_date) = update.next_due_date {
            schedule.next_due_date = next_due_date;
        }
        if let Some(status) = update.status {
            schedule.status = status;
        }

        self.store
            .update_schedule(&schedule)
            .await
            .map_err(BillingError::Upstream)?;
        self.cache.invalidate(&cache_key(&schedule.tenant_id));

        info!(
            tenant_id = %schedule.tenant_id,
            schedule_id = %schedule.id,
            next_due_date = %schedule.next_due_date,
            status = %schedule.status,
            "billing schedule updated"
        );
        Ok(schedule)
    }

    async fn find_schedule(
        &self,
        tenant_id: &str,
        schedule_id: &str,
    ) -> BillingResult<BillingSchedule> {
        let tenant_id = require_id(tenant_id, "tenant id")?;
        let schedule_id = require_id(schedule_id, "schedule id")?;
        self.store
            .find_schedule(tenant_id, schedule_id)
            .await
            .map_err(BillingError::Upstream)?
            .ok_or_else(|| BillingError::ScheduleNotFound {
                tenant_id: tenant_id.to_string(),
                schedule_id: schedule_id.to_string(),
            })
    }
}

fn require_id<'a>(value: &'a str, what: &str) -> BillingResult<&'a str> {
    if value.trim().is_empty() {
        return Err(BillingError::Validation(format!("{what} is required")));
    }
    Ok(value)
}
