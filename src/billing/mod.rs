//! Tenant billing status: overdue evaluation, the per-tenant status cache and
//! the mutations that must invalidate it.

pub mod api;
pub mod cache;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod rollover;
pub mod service;
pub mod store;

pub use api::{routes, InvalidateResponse};
pub use cache::{cache_key, spawn_sweeper, BillingStatusCache, CacheSweeper};
pub use error::{BillingError, BillingResult};
pub use evaluator::{days_overdue, evaluate};
pub use models::{
    BillingFrequency, BillingSchedule, BillingScheduleStatus, BillingStatus,
    OverdueScheduleView, ScheduleUpdate,
};
pub use service::BillingStatusService;
pub use store::{PgScheduleStore, ScheduleStore};
