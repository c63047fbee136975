//! In-process store for tests and database-free local runs.

use crate::models::{
    Invoice, InvoiceDetail, InvoiceDraft, InvoiceItem, InvoiceStatus, InvoiceSummary,
    ListInvoicesFilter, Payment, RecordPayment, RecurringSchedule, ScheduleAdvance, ScheduleDraft,
    ScheduleSummary, TenantScope,
};
use crate::numbering::format_invoice_number;
use crate::services::store::InvoiceStore;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use service_core::error::AppError;
use sqlx::types::Json;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;

struct Customer {
    tenant_id: Option<Uuid>,
    company_name: String,
}

#[derive(Default)]
struct State {
    customers: HashMap<Uuid, Customer>,
    last_sequence: i64,
    invoices: Vec<Invoice>,
    items: Vec<InvoiceItem>,
    payments: Vec<Payment>,
    schedules: Vec<RecurringSchedule>,
}

impl State {
    /// Customers visible to a row owned by `tenant_id`.
    fn customer(&self, customer_id: Uuid, tenant_id: Option<Uuid>) -> Option<&Customer> {
        self.customers
            .get(&customer_id)
            .filter(|c| TenantScope::from_tenant_id(tenant_id).permits(c.tenant_id))
    }

    fn require_customer(
        &self,
        customer_id: Uuid,
        tenant_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        match self.customer(customer_id, tenant_id) {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(anyhow::anyhow!("Customer not found"))),
        }
    }

    fn customer_name(&self, customer_id: Uuid, tenant_id: Option<Uuid>) -> Option<String> {
        self.customer(customer_id, tenant_id)
            .map(|c| c.company_name.clone())
    }
}

/// Store holding everything behind one async mutex.
///
/// Each trait call takes the lock once, so multi-row writes are atomic the
/// same way a database transaction is. Customers must be registered before
/// they are referenced, and a tenant's rows may only reference its own.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_customer(
        &self,
        customer_id: Uuid,
        tenant_id: Option<Uuid>,
        company_name: impl Into<String>,
    ) {
        let mut state = self.state.lock().await;
        state.customers.insert(
            customer_id,
            Customer {
                tenant_id,
                company_name: company_name.into(),
            },
        );
    }

    /// Forget a customer; later writes referencing it fail.
    pub async fn remove_customer(&self, customer_id: Uuid) {
        let mut state = self.state.lock().await;
        state.customers.remove(&customer_id);
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    #[instrument(skip(self, draft, advance), fields(customer_id = %draft.customer_id))]
    async fn insert_invoice(
        &self,
        draft: &InvoiceDraft,
        number_year: i32,
        advance: Option<&ScheduleAdvance>,
    ) -> Result<Invoice, AppError> {
        let mut state = self.state.lock().await;
        state.require_customer(draft.customer_id, draft.tenant_id)?;

        let schedule_index = match advance {
            Some(advance) => Some(
                state
                    .schedules
                    .iter()
                    .position(|s| {
                        s.recurring_invoice_id == advance.recurring_invoice_id
                            && s.active
                            && s.next_run_at == advance.expected_next_run_at
                    })
                    .ok_or_else(|| {
                        AppError::Conflict(anyhow::anyhow!(
                            "Recurring invoice {} was already advanced",
                            advance.recurring_invoice_id
                        ))
                    })?,
            ),
            None => None,
        };

        let sequence = state.last_sequence + 1;
        let invoice = Invoice {
            invoice_id: Uuid::new_v4(),
            tenant_id: draft.tenant_id,
            sequence,
            invoice_number: format_invoice_number(sequence, number_year),
            customer_id: draft.customer_id,
            recurring_invoice_id: draft.recurring_invoice_id,
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            status: draft.status.as_str().to_string(),
            currency: draft.currency.clone(),
            subtotal: draft.subtotal,
            tax_rate: draft.tax_rate,
            tax_total: draft.tax_total,
            total: draft.total,
            notes: draft.notes.clone(),
            created_utc: Utc::now(),
        };

        let items = draft.items.iter().map(|item| InvoiceItem {
            item_id: Uuid::new_v4(),
            invoice_id: invoice.invoice_id,
            tenant_id: draft.tenant_id,
            position: item.position,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total,
        });
        let items: Vec<_> = items.collect();

        state.last_sequence = sequence;
        state.items.extend(items);
        state.invoices.push(invoice.clone());

        if let (Some(index), Some(advance)) = (schedule_index, advance) {
            let schedule = &mut state.schedules[index];
            schedule.last_run_at = Some(advance.last_run_at);
            schedule.next_run_at = advance.next_run_at;
            schedule.occurrences = advance.occurrences;
            schedule.active = advance.active;
        }

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice created"
        );

        Ok(invoice)
    }

    async fn get_invoice(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let state = self.state.lock().await;

        let Some(invoice) = state
            .invoices
            .iter()
            .find(|i| i.invoice_id == invoice_id && scope.permits(i.tenant_id))
        else {
            return Ok(None);
        };

        let items = state
            .items
            .iter()
            .filter(|item| item.invoice_id == invoice_id)
            .cloned()
            .collect();
        let payments = state
            .payments
            .iter()
            .filter(|payment| payment.invoice_id == invoice_id)
            .cloned()
            .collect();

        Ok(Some(InvoiceDetail::new(
            invoice.clone(),
            state.customer_name(invoice.customer_id, invoice.tenant_id),
            items,
            payments,
        )))
    }

    async fn list_invoices(
        &self,
        scope: TenantScope,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceSummary>, AppError> {
        let state = self.state.lock().await;

        let mut invoices: Vec<&Invoice> = state
            .invoices
            .iter()
            .filter(|i| scope.permits(i.tenant_id))
            .filter(|i| filter.status.map_or(true, |s| i.status == s.as_str()))
            .filter(|i| filter.customer_id.map_or(true, |c| i.customer_id == c))
            .collect();
        invoices.sort_by(|a, b| {
            b.issue_date
                .cmp(&a.issue_date)
                .then(b.sequence.cmp(&a.sequence))
        });

        Ok(invoices
            .into_iter()
            .map(|i| InvoiceSummary {
                invoice_id: i.invoice_id,
                tenant_id: i.tenant_id,
                sequence: i.sequence,
                invoice_number: i.invoice_number.clone(),
                customer_id: i.customer_id,
                customer_name: state.customer_name(i.customer_id, i.tenant_id),
                issue_date: i.issue_date,
                due_date: i.due_date,
                status: i.status.clone(),
                currency: i.currency.clone(),
                total: i.total,
            })
            .collect())
    }

    async fn update_invoice_status(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;

        match state
            .invoices
            .iter_mut()
            .find(|i| i.invoice_id == invoice_id && scope.permits(i.tenant_id))
        {
            Some(invoice) => {
                invoice.status = status.as_str().to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_payment(
        &self,
        scope: TenantScope,
        input: &RecordPayment,
    ) -> Result<Option<Payment>, AppError> {
        let mut state = self.state.lock().await;

        let Some(tenant_id) = state
            .invoices
            .iter()
            .find(|i| i.invoice_id == input.invoice_id && scope.permits(i.tenant_id))
            .map(|i| i.tenant_id)
        else {
            return Ok(None);
        };

        let payment = Payment {
            payment_id: Uuid::new_v4(),
            invoice_id: input.invoice_id,
            tenant_id,
            amount: input.amount,
            payment_date: input.payment_date,
            method: input.method.clone(),
            reference: input.reference.clone(),
            notes: input.notes.clone(),
            created_utc: Utc::now(),
        };
        state.payments.push(payment.clone());

        Ok(Some(payment))
    }

    async fn insert_schedule(&self, draft: &ScheduleDraft) -> Result<RecurringSchedule, AppError> {
        let mut state = self.state.lock().await;
        state.require_customer(draft.customer_id, draft.tenant_id)?;

        let schedule = RecurringSchedule {
            recurring_invoice_id: Uuid::new_v4(),
            tenant_id: draft.tenant_id,
            customer_id: draft.customer_id,
            service_overview: draft.service_overview.clone(),
            start_date: draft.start_date,
            frequency: draft.frequency.as_str().to_string(),
            occurrences: draft.occurrences,
            subtotal: draft.subtotal,
            tax_rate: draft.tax_rate,
            tax_total: draft.tax_total,
            total: draft.total,
            notes: draft.notes.clone(),
            next_run_at: draft.next_run_at,
            last_run_at: None,
            template_payload: Json(draft.template.clone()),
            active: true,
            created_utc: Utc::now(),
        };
        state.schedules.push(schedule.clone());

        Ok(schedule)
    }

    async fn get_schedule(
        &self,
        scope: TenantScope,
        recurring_invoice_id: Uuid,
    ) -> Result<Option<RecurringSchedule>, AppError> {
        let state = self.state.lock().await;

        Ok(state
            .schedules
            .iter()
            .find(|s| {
                s.recurring_invoice_id == recurring_invoice_id && scope.permits(s.tenant_id)
            })
            .cloned())
    }

    async fn list_schedules(&self, scope: TenantScope) -> Result<Vec<ScheduleSummary>, AppError> {
        let state = self.state.lock().await;

        let mut schedules: Vec<&RecurringSchedule> = state
            .schedules
            .iter()
            .filter(|s| scope.permits(s.tenant_id))
            .collect();
        schedules.sort_by_key(|s| (s.next_run_at, s.created_utc));

        Ok(schedules
            .into_iter()
            .map(|s| ScheduleSummary {
                recurring_invoice_id: s.recurring_invoice_id,
                tenant_id: s.tenant_id,
                customer_id: s.customer_id,
                customer_name: state.customer_name(s.customer_id, s.tenant_id),
                service_overview: s.service_overview.clone(),
                frequency: s.frequency.clone(),
                occurrences: s.occurrences,
                next_run_at: s.next_run_at,
                last_run_at: s.last_run_at,
                total: s.total,
                active: s.active,
            })
            .collect())
    }

    async fn due_schedules(
        &self,
        scope: TenantScope,
        today: NaiveDate,
    ) -> Result<Vec<RecurringSchedule>, AppError> {
        let state = self.state.lock().await;

        let mut due: Vec<RecurringSchedule> = state
            .schedules
            .iter()
            .filter(|s| scope.permits(s.tenant_id) && s.is_due(today))
            .cloned()
            .collect();
        due.sort_by_key(|s| (s.next_run_at, s.created_utc));

        Ok(due)
    }
}
