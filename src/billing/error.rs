use thiserror::Error;

/// key: billing-errors -> failures surfaced by the status pipeline
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("{0}")]
    Validation(String),
    #[error("billing schedule {schedule_id} not found for tenant {tenant_id}")]
    ScheduleNotFound {
        tenant_id: String,
        schedule_id: String,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("billing schedule store failed")]
    Upstream(#[source] anyhow::Error),
}

pub type BillingResult<T> = Result<T, BillingError>;
