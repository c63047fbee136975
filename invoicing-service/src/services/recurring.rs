//! Recurring invoice schedules and the run that turns them into invoices.

use crate::models::{
    sanitize_items, CreateInvoice, CreateSchedule, Frequency, InvoiceStatus, ItemTemplate,
    RecurringRunReport, RecurringSchedule, ScheduleDraft, ScheduleFailure, ScheduleSummary,
    TenantScope, DEFAULT_CURRENCY,
};
use crate::services::clock::Clock;
use crate::services::invoices::{
    clamp_tax_rate, prepare_invoice, price_items, trim_optional, InvoiceService,
};
use crate::services::metrics;
use crate::services::store::InvoiceStore;
use chrono::Duration;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Days between issue and due date on generated invoices.
pub const RECURRING_PAYMENT_TERM_DAYS: i64 = 14;

/// Validate and price a schedule request without touching storage.
///
/// Items follow the invoice filtering rule. `occurrences` of zero or none
/// means the schedule never runs out.
pub fn prepare_schedule(input: &CreateSchedule) -> Result<ScheduleDraft, AppError> {
    let service_overview = input.service_overview.trim();
    if service_overview.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Service overview is required"
        )));
    }

    if input.items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At least one line item is required"
        )));
    }

    let items = sanitize_items(&input.items)?;
    if items.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "At least one valid line item is required"
        )));
    }

    let occurrences = match input.occurrences {
        Some(n) if n < 0 => {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Occurrences cannot be negative"
            )))
        }
        Some(0) | None => None,
        Some(n) => Some(n),
    };

    let tax_rate = clamp_tax_rate(input.tax_rate)?;
    let totals = price_items(&items, tax_rate)?;

    Ok(ScheduleDraft {
        tenant_id: input.tenant_id,
        customer_id: input.customer_id,
        service_overview: service_overview.to_string(),
        start_date: input.start_date,
        next_run_at: input.next_run_at.unwrap_or(input.start_date),
        frequency: Frequency::from_string(&input.frequency),
        occurrences,
        subtotal: totals.subtotal,
        tax_rate,
        tax_total: totals.tax_total,
        total: totals.total,
        notes: trim_optional(input.notes.as_deref()),
        template: ItemTemplate::from_items(&items),
    })
}

/// Schedule management and the due-schedule run.
#[derive(Clone)]
pub struct RecurringEngine {
    store: Arc<dyn InvoiceStore>,
    invoices: InvoiceService,
    clock: Arc<dyn Clock>,
}

impl RecurringEngine {
    pub fn new(store: Arc<dyn InvoiceStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            invoices: InvoiceService::new(store.clone(), clock.clone()),
            store,
            clock,
        }
    }

    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_schedule(
        &self,
        input: &CreateSchedule,
    ) -> Result<RecurringSchedule, AppError> {
        let draft = prepare_schedule(input)?;
        let schedule = self.store.insert_schedule(&draft).await?;

        info!(
            recurring_invoice_id = %schedule.recurring_invoice_id,
            frequency = %schedule.frequency,
            next_run_at = %schedule.next_run_at,
            "Recurring invoice created"
        );

        Ok(schedule)
    }

    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn get_schedule(
        &self,
        scope: TenantScope,
        recurring_invoice_id: Uuid,
    ) -> Result<RecurringSchedule, AppError> {
        self.store
            .get_schedule(scope, recurring_invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Recurring invoice not found")))
    }

    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn list_schedules(
        &self,
        scope: TenantScope,
    ) -> Result<Vec<ScheduleSummary>, AppError> {
        self.store.list_schedules(scope).await
    }

    /// Generate one invoice for every schedule due today.
    ///
    /// A schedule that fails is reported and left untouched; the rest of the
    /// batch still runs. Only failing to load the due schedules aborts.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn run_due_schedules(
        &self,
        scope: TenantScope,
    ) -> Result<RecurringRunReport, AppError> {
        let today = self.clock.today();
        let due = self.store.due_schedules(scope, today).await?;

        let mut report = RecurringRunReport::default();

        for schedule in &due {
            match self.run_schedule(schedule).await {
                Ok(invoice_id) => {
                    metrics::record_recurring_run("created");
                    report.created_invoice_ids.push(invoice_id);
                }
                Err(e) => {
                    metrics::record_recurring_run("failed");
                    metrics::record_error(e.kind());
                    warn!(
                        recurring_invoice_id = %schedule.recurring_invoice_id,
                        error = %e,
                        "Failed to generate recurring invoice"
                    );
                    report.failures.push(ScheduleFailure {
                        recurring_invoice_id: schedule.recurring_invoice_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            due = due.len(),
            created = report.created_invoice_ids.len(),
            failed = report.failures.len(),
            "Recurring run completed"
        );

        Ok(report)
    }

    async fn run_schedule(&self, schedule: &RecurringSchedule) -> Result<Uuid, AppError> {
        let today = self.clock.today();

        let draft = prepare_invoice(&CreateInvoice {
            tenant_id: schedule.tenant_id,
            customer_id: schedule.customer_id,
            issue_date: today,
            due_date: today + Duration::days(RECURRING_PAYMENT_TERM_DAYS),
            tax_rate: schedule.tax_rate,
            status: Some(InvoiceStatus::Open.as_str().to_string()),
            currency: Some(DEFAULT_CURRENCY.to_string()),
            notes: schedule.notes.clone(),
            recurring_invoice_id: Some(schedule.recurring_invoice_id),
            items: schedule.template().to_raw_items(),
        })?;

        let advance = schedule.advance(today);
        let invoice = self.invoices.persist(&draft, Some(&advance)).await?;

        info!(
            recurring_invoice_id = %schedule.recurring_invoice_id,
            invoice_number = %invoice.invoice_number,
            next_run_at = %advance.next_run_at,
            active = advance.active,
            "Recurring invoice generated"
        );

        Ok(invoice.invoice_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawItem;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn input() -> CreateSchedule {
        CreateSchedule {
            tenant_id: None,
            customer_id: Uuid::new_v4(),
            service_overview: "Managed hosting".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            next_run_at: None,
            frequency: "monthly".to_string(),
            occurrences: None,
            tax_rate: d("19"),
            notes: None,
            items: vec![RawItem::new("Hosting", d("1"), d("100"))],
        }
    }

    #[test]
    fn test_prepare_schedule_defaults() {
        let draft = prepare_schedule(&input()).unwrap();

        assert_eq!(draft.next_run_at, draft.start_date);
        assert_eq!(draft.frequency, Frequency::Monthly);
        assert_eq!(draft.occurrences, None);
        assert_eq!(draft.total, d("119.00"));
        assert_eq!(draft.template.items.len(), 1);
    }

    #[test]
    fn test_prepare_schedule_occurrences() {
        let mut request = input();
        request.occurrences = Some(0);
        assert_eq!(prepare_schedule(&request).unwrap().occurrences, None);

        request.occurrences = Some(3);
        assert_eq!(prepare_schedule(&request).unwrap().occurrences, Some(3));

        request.occurrences = Some(-1);
        assert!(matches!(
            prepare_schedule(&request),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_prepare_schedule_requires_overview_and_items() {
        let mut request = input();
        request.service_overview = "  ".to_string();
        assert!(prepare_schedule(&request).is_err());

        let mut request = input();
        request.items = vec![RawItem::new("Broken", d("0"), d("10"))];
        assert!(prepare_schedule(&request).is_err());
    }

    #[test]
    fn test_prepare_schedule_rejects_out_of_range_template() {
        let mut request = input();
        let huge = d("100000000000000000000");
        request.items = vec![RawItem::new("Hosting", huge, huge)];

        assert!(matches!(
            prepare_schedule(&request),
            Err(AppError::BadRequest(_))
        ));
    }
}
