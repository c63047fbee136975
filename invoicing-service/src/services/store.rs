//! Data-access boundary for invoicing-service.

use crate::models::{
    Invoice, InvoiceDetail, InvoiceDraft, InvoiceStatus, InvoiceSummary, ListInvoicesFilter,
    Payment, RecordPayment, RecurringSchedule, ScheduleAdvance, ScheduleDraft, ScheduleSummary,
    TenantScope,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use uuid::Uuid;

/// Persistence for invoices, items, payments and recurring schedules.
///
/// Every call touching existing rows takes a [`TenantScope`]; a row outside
/// the scope behaves exactly like a missing row.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), AppError>;

    /// Persist a priced invoice and its items atomically.
    ///
    /// Allocates the next sequence and the number `INV-{year}-{seq:04}` inside
    /// the same unit of work. When `advance` is given, the schedule run-state
    /// is updated in that unit too, guarded by its expected `next_run_at`;
    /// a stale guard yields `Conflict` and nothing is written.
    async fn insert_invoice(
        &self,
        draft: &InvoiceDraft,
        number_year: i32,
        advance: Option<&ScheduleAdvance>,
    ) -> Result<Invoice, AppError>;

    async fn get_invoice(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError>;

    /// Newest issue date first, ties broken by sequence descending.
    async fn list_invoices(
        &self,
        scope: TenantScope,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceSummary>, AppError>;

    /// Returns `false` when no visible invoice has this id.
    async fn update_invoice_status(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<bool, AppError>;

    /// Returns `None` when the invoice is not visible in `scope`.
    async fn insert_payment(
        &self,
        scope: TenantScope,
        payment: &RecordPayment,
    ) -> Result<Option<Payment>, AppError>;

    async fn insert_schedule(&self, draft: &ScheduleDraft) -> Result<RecurringSchedule, AppError>;

    async fn get_schedule(
        &self,
        scope: TenantScope,
        recurring_invoice_id: Uuid,
    ) -> Result<Option<RecurringSchedule>, AppError>;

    /// Soonest `next_run_at` first.
    async fn list_schedules(&self, scope: TenantScope) -> Result<Vec<ScheduleSummary>, AppError>;

    /// Active schedules with `next_run_at <= today`, soonest first.
    async fn due_schedules(
        &self,
        scope: TenantScope,
        today: NaiveDate,
    ) -> Result<Vec<RecurringSchedule>, AppError>;
}
