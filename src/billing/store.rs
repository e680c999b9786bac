use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::models::{BillingFrequency, BillingSchedule, BillingScheduleStatus};

/// key: billing-schedule-store -> persistence seam for the status pipeline
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Active schedules of one tenant, ordered by `next_due_date` ascending.
    async fn load_active_schedules(&self, tenant_id: &str) -> Result<Vec<BillingSchedule>>;

    async fn find_schedule(
        &self,
        tenant_id: &str,
        schedule_id: &str,
    ) -> Result<Option<BillingSchedule>>;

    /// Records a payment against `previous.id` and replaces `previous` with
    /// the rolled-over `settled` schedule in one unit of work.
    ///
    /// Returns `false` without writing anything when the stored schedule is
    /// no longer ACTIVE with `previous.next_due_date`, i.e. another
    /// settlement or update got there first.
    async fn record_settlement(
        &self,
        previous: &BillingSchedule,
        settled: &BillingSchedule,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<bool>;

    async fn update_schedule(&self, schedule: &BillingSchedule) -> Result<()>;
}

/// Postgres-backed store over `billing_schedules` / `billing_payments`.
#[derive(Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SCHEDULE_COLUMNS: &str =
    "id, tenant_id, label, amount, frequency, status, next_due_date";

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn load_active_schedules(&self, tenant_id: &str) -> Result<Vec<BillingSchedule>> {
        let rows = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM billing_schedules \
             WHERE tenant_id = $1 AND status = 'ACTIVE' \
             ORDER BY next_due_date ASC, id ASC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("loading active billing schedules for tenant {tenant_id}"))?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn find_schedule(
        &self,
        tenant_id: &str,
        schedule_id: &str,
    ) -> Result<Option<BillingSchedule>> {
        let row = sqlx::query(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM billing_schedules WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id)
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("loading billing schedule {schedule_id}"))?;

        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn record_settlement(
        &self,
        previous: &BillingSchedule,
        settled: &BillingSchedule,
        amount: Decimal,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here serializes racing settlements; the loser
        // re-checks the predicate against the committed row and matches nothing.
        let advanced = sqlx::query(
            "UPDATE billing_schedules \
             SET next_due_date = $1, status = $2, updated_at = NOW() \
             WHERE id = $3 AND tenant_id = $4 \
               AND status = 'ACTIVE' AND next_due_date = $5",
        )
        .bind(settled.next_due_date)
        .bind(settled.status.as_str())
        .bind(&previous.id)
        .bind(&previous.tenant_id)
        .bind(previous.next_due_date)
        .execute(&mut tx)
        .await
        .with_context(|| format!("advancing billing schedule {}", previous.id))?;

        if advanced.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO billing_payments (tenant_id, schedule_id, amount, paid_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&previous.tenant_id)
        .bind(&previous.id)
        .bind(amount)
        .bind(paid_at)
        .execute(&mut tx)
        .await
        .context("recording billing payment")?;

        tx.commit().await?;
        Ok(true)
    }

    async fn update_schedule(&self, schedule: &BillingSchedule) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_schedule(&mut tx, schedule).await?;
        tx.commit().await?;
        Ok(())
    }
}

async fn write_schedule(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    schedule: &BillingSchedule,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE billing_schedules \
         SET next_due_date = $1, status = $2, updated_at = NOW() \
         WHERE id = $3 AND tenant_id = $4",
    )
    .bind(schedule.next_due_date)
    .bind(schedule.status.as_str())
    .bind(&schedule.id)
    .bind(&schedule.tenant_id)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("updating billing schedule {}", schedule.id))?;

    if result.rows_affected() == 0 {
        anyhow::bail!("billing schedule {} disappeared during update", schedule.id);
    }
    Ok(())
}

fn schedule_from_row(row: &PgRow) -> Result<BillingSchedule> {
    let frequency: String = row.try_get("frequency")?;
    let status: String = row.try_get("status")?;
    Ok(BillingSchedule {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        label: row.try_get("label")?,
        amount: row.try_get("amount")?,
        frequency: frequency.parse::<BillingFrequency>()?,
        status: status.parse::<BillingScheduleStatus>()?,
        next_due_date: row.try_get("next_due_date")?,
    })
}
