use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::AppResult;
use crate::extractor::AuthUser;

use super::{BillingSchedule, BillingStatus, BillingStatusService, ScheduleUpdate};

/// key: billing-api -> status check + invalidation endpoints
pub fn routes() -> Router {
    Router::new()
        .route("/billing/check/:tenant_id", get(check_status))
        .route("/billing/invalidate/:tenant_id", post(invalidate))
        .route(
            "/billing/schedules/:tenant_id/:schedule_id",
            patch(update_schedule),
        )
        .route(
            "/billing/schedules/:tenant_id/:schedule_id/settle",
            post(settle_payment),
        )
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub success: bool,
    pub message: String,
}

pub async fn check_status(
    AuthUser { user_id, .. }: AuthUser,
    Extension(service): Extension<Arc<BillingStatusService>>,
    Path(tenant_id): Path<String>,
) -> AppResult<Json<BillingStatus>> {
    tracing::debug!(user_id, %tenant_id, "billing status check");
    let status = service.check_status(&tenant_id).await?;
    Ok(Json(status))
}

pub async fn invalidate(
    AuthUser { user_id, .. }: AuthUser,
    Extension(service): Extension<Arc<BillingStatusService>>,
    Path(tenant_id): Path<String>,
) -> AppResult<Json<InvalidateResponse>> {
    service.invalidate(&tenant_id)?;
    tracing::info!(user_id, %tenant_id, "billing cache invalidation requested");
    Ok(Json(InvalidateResponse {
        success: true,
        message: format!("billing status cache cleared for tenant {tenant_id}"),
    }))
}

pub async fn settle_payment(
    AuthUser { user_id, .. }: AuthUser,
    Extension(service): Extension<Arc<BillingStatusService>>,
    Path((tenant_id, schedule_id)): Path<(String, String)>,
) -> AppResult<Json<BillingSchedule>> {
    tracing::debug!(user_id, %tenant_id, %schedule_id, "billing payment settlement");
    let schedule = service
        .settle_payment(&tenant_id, &schedule_id, Utc::now())
        .await?;
    Ok(Json(schedule))
}

pub async fn update_schedule(
    AuthUser { user_id, .. }: AuthUser,
    Extension(service): Extension<Arc<BillingStatusService>>,
    Path((tenant_id, schedule_id)): Path<(String, String)>,
    Json(payload): Json<ScheduleUpdate>,
) -> AppResult<Json<BillingSchedule>> {
    tracing::debug!(user_id, %tenant_id, %schedule_id, "billing schedule update");
    let schedule = service
        .update_schedule(&tenant_id, &schedule_id, payload)
        .await?;
    Ok(Json(schedule))
}
