//! Recurring invoice handlers.

use crate::dtos::CreateScheduleRequest;
use crate::models::{RecurringRunReport, RecurringSchedule, ScheduleSummary, TenantScope};
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn create_schedule(
    State(state): State<AppState>,
    scope: TenantScope,
    ValidatedJson(payload): ValidatedJson<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<RecurringSchedule>), AppError> {
    let schedule = state
        .recurring
        .create_schedule(&payload.into_input(scope))
        .await?;

    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn list_schedules(
    State(state): State<AppState>,
    scope: TenantScope,
) -> Result<Json<Vec<ScheduleSummary>>, AppError> {
    Ok(Json(state.recurring.list_schedules(scope).await?))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(recurring_invoice_id): Path<Uuid>,
) -> Result<Json<RecurringSchedule>, AppError> {
    Ok(Json(
        state
            .recurring
            .get_schedule(scope, recurring_invoice_id)
            .await?,
    ))
}

/// Run due schedules now, limited to the caller's scope.
pub async fn run_due_schedules(
    State(state): State<AppState>,
    scope: TenantScope,
) -> Result<Json<RecurringRunReport>, AppError> {
    Ok(Json(state.recurring.run_due_schedules(scope).await?))
}
