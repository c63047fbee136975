//! Invoice handlers.
//!
//! Every operation runs inside the caller's tenant scope.

use crate::dtos::{CreateInvoiceRequest, ListInvoicesQuery, RecordPaymentRequest, UpdateStatusRequest};
use crate::models::{Invoice, InvoiceDetail, InvoiceSummary, ListInvoicesFilter, Payment, TenantScope};
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn create_invoice(
    State(state): State<AppState>,
    scope: TenantScope,
    ValidatedJson(payload): ValidatedJson<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let invoice = state
        .invoices
        .create_invoice(&payload.into_input(scope))
        .await?;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    scope: TenantScope,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<Vec<InvoiceSummary>>, AppError> {
    let filter = ListInvoicesFilter::try_from(query)?;
    let invoices = state.invoices.list_invoices(scope, &filter).await?;

    Ok(Json(invoices))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let invoice = state.invoices.get_invoice(scope, invoice_id).await?;

    Ok(Json(invoice))
}

pub async fn update_status(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<StatusCode, AppError> {
    state
        .invoices
        .update_status(scope, invoice_id, &payload.status)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn record_payment(
    State(state): State<AppState>,
    scope: TenantScope,
    Path(invoice_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let input = payload.into_input(invoice_id, state.clock.today());
    let payment = state.invoices.record_payment(scope, &input).await?;

    Ok((StatusCode::CREATED, Json(payment)))
}
