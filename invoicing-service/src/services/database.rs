//! Database service for invoicing-service.

use crate::models::{
    Invoice, InvoiceDetail, InvoiceDraft, InvoiceItem, InvoiceStatus, InvoiceSummary,
    ListInvoicesFilter, Payment, RecordPayment, RecurringSchedule, ScheduleAdvance, ScheduleDraft,
    ScheduleSummary, TenantScope,
};
use crate::numbering::format_invoice_number;
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::InvoiceStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(FromRow)]
struct InvoiceWithCustomer {
    #[sqlx(flatten)]
    invoice: Invoice,
    customer_name: Option<String>,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Create a customer row. Customers are owned by the CRM; this exists
    /// for seeding and tests.
    #[instrument(skip(self, company_name))]
    pub async fn create_customer(
        &self,
        tenant_id: Option<Uuid>,
        company_name: &str,
    ) -> Result<Uuid, AppError> {
        let customer_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO customers (customer_id, tenant_id, company_name)
            VALUES ($1, $2, $3)
            RETURNING customer_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(company_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create customer: {}", e)))?;

        Ok(customer_id)
    }

    async fn get_items(&self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, AppError> {
        sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT item_id, invoice_id, tenant_id, position, description, quantity, unit_price, line_total
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY position
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e)))
    }

    async fn get_payments(&self, invoice_id: Uuid) -> Result<Vec<Payment>, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, invoice_id, tenant_id, amount, payment_date, method, reference, notes, created_utc
            FROM payments
            WHERE invoice_id = $1
            ORDER BY payment_date DESC, created_utc DESC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payments: {}", e)))
    }
}

#[async_trait]
impl InvoiceStore for Database {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self, draft, advance), fields(customer_id = %draft.customer_id))]
    async fn insert_invoice(
        &self,
        draft: &InvoiceDraft,
        number_year: i32,
        advance: Option<&ScheduleAdvance>,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        // The customer must belong to the invoice's tenant; a tenantless
        // invoice may reference any customer.
        let customer = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT customer_id FROM customers
            WHERE customer_id = $1 AND ($2::uuid IS NULL OR tenant_id = $2)
            FOR SHARE
            "#,
        )
        .bind(draft.customer_id)
        .bind(draft.tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to resolve customer: {}", e)))?;

        if customer.is_none() {
            tx.rollback().await.ok();
            return Err(AppError::NotFound(anyhow::anyhow!("Customer not found")));
        }

        // Claim the schedule run first; a second runner blocks here on the row
        // lock and then matches nothing.
        if let Some(advance) = advance {
            let result = sqlx::query(
                r#"
                UPDATE recurring_invoices
                SET last_run_at = $2, next_run_at = $3, occurrences = $4, active = $5
                WHERE recurring_invoice_id = $1 AND next_run_at = $6 AND active = TRUE
                "#,
            )
            .bind(advance.recurring_invoice_id)
            .bind(advance.last_run_at)
            .bind(advance.next_run_at)
            .bind(advance.occurrences)
            .bind(advance.active)
            .bind(advance.expected_next_run_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to advance schedule: {}", e))
            })?;

            if result.rows_affected() == 0 {
                tx.rollback().await.ok();
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Recurring invoice {} was already advanced",
                    advance.recurring_invoice_id
                )));
            }
        }

        let sequence = sqlx::query_scalar::<_, i64>("SELECT nextval('invoice_sequence')")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to allocate sequence: {}", e))
            })?;
        let invoice_number = format_invoice_number(sequence, number_year);

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                invoice_id, tenant_id, sequence, invoice_number, customer_id, recurring_invoice_id,
                issue_date, due_date, status, currency, subtotal, tax_rate, tax_total, total, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING invoice_id, tenant_id, sequence, invoice_number, customer_id, recurring_invoice_id,
                issue_date, due_date, status, currency, subtotal, tax_rate, tax_total, total, notes, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(draft.tenant_id)
        .bind(sequence)
        .bind(&invoice_number)
        .bind(draft.customer_id)
        .bind(draft.recurring_invoice_id)
        .bind(draft.issue_date)
        .bind(draft.due_date)
        .bind(draft.status.as_str())
        .bind(&draft.currency)
        .bind(draft.subtotal)
        .bind(draft.tax_rate)
        .bind(draft.tax_total)
        .bind(draft.total)
        .bind(&draft.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number '{}' already exists",
                    invoice_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        for item in &draft.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    item_id, invoice_id, tenant_id, position, description, quantity, unit_price, line_total
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice.invoice_id)
            .bind(draft.tenant_id)
            .bind(item.position)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.line_total)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice item: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            items = draft.items.len(),
            "Invoice created"
        );

        Ok(invoice)
    }

    #[instrument(skip(self), fields(scope = %scope, invoice_id = %invoice_id))]
    async fn get_invoice(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let row = sqlx::query_as::<_, InvoiceWithCustomer>(
            r#"
            SELECT i.invoice_id, i.tenant_id, i.sequence, i.invoice_number, i.customer_id,
                i.recurring_invoice_id, i.issue_date, i.due_date, i.status, i.currency, i.subtotal,
                i.tax_rate, i.tax_total, i.total, i.notes, i.created_utc,
                c.company_name AS customer_name
            FROM invoices i
            LEFT JOIN customers c ON c.customer_id = i.customer_id
                AND (i.tenant_id IS NULL OR c.tenant_id = i.tenant_id)
            WHERE i.invoice_id = $2
              AND ($1::uuid IS NULL OR i.tenant_id = $1)
            "#,
        )
        .bind(scope.tenant_id())
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        let Some(row) = row else {
            timer.observe_duration();
            return Ok(None);
        };

        let items = self.get_items(invoice_id).await?;
        let payments = self.get_payments(invoice_id).await?;

        timer.observe_duration();

        Ok(Some(InvoiceDetail::new(
            row.invoice,
            row.customer_name,
            items,
            payments,
        )))
    }

    #[instrument(skip(self, filter), fields(scope = %scope))]
    async fn list_invoices(
        &self,
        scope: TenantScope,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = sqlx::query_as::<_, InvoiceSummary>(
            r#"
            SELECT i.invoice_id, i.tenant_id, i.sequence, i.invoice_number, i.customer_id,
                c.company_name AS customer_name, i.issue_date, i.due_date, i.status, i.currency, i.total
            FROM invoices i
            LEFT JOIN customers c ON c.customer_id = i.customer_id
                AND (i.tenant_id IS NULL OR c.tenant_id = i.tenant_id)
            WHERE ($1::uuid IS NULL OR i.tenant_id = $1)
              AND ($2::varchar IS NULL OR i.status = $2)
              AND ($3::uuid IS NULL OR i.customer_id = $3)
            ORDER BY i.issue_date DESC, i.sequence DESC
            "#,
        )
        .bind(scope.tenant_id())
        .bind(&status_str)
        .bind(filter.customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self), fields(scope = %scope, invoice_id = %invoice_id))]
    async fn update_invoice_status(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice_status"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = $3
            WHERE invoice_id = $2
              AND ($1::uuid IS NULL OR tenant_id = $1)
            "#,
        )
        .bind(scope.tenant_id())
        .bind(invoice_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice status: {}", e))
        })?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, input), fields(scope = %scope, invoice_id = %input.invoice_id))]
    async fn insert_payment(
        &self,
        scope: TenantScope,
        input: &RecordPayment,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        // The payment inherits the invoice's tenant; an invisible invoice inserts nothing.
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                payment_id, invoice_id, tenant_id, amount, payment_date, method, reference, notes
            )
            SELECT $3, i.invoice_id, i.tenant_id, $4, $5, $6, $7, $8
            FROM invoices i
            WHERE i.invoice_id = $2
              AND ($1::uuid IS NULL OR i.tenant_id = $1)
            RETURNING payment_id, invoice_id, tenant_id, amount, payment_date, method, reference, notes, created_utc
            "#,
        )
        .bind(scope.tenant_id())
        .bind(input.invoice_id)
        .bind(Uuid::new_v4())
        .bind(input.amount)
        .bind(input.payment_date)
        .bind(&input.method)
        .bind(&input.reference)
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e))
        })?;

        timer.observe_duration();

        Ok(payment)
    }

    #[instrument(skip(self, draft), fields(customer_id = %draft.customer_id))]
    async fn insert_schedule(&self, draft: &ScheduleDraft) -> Result<RecurringSchedule, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_schedule"])
            .start_timer();

        let schedule = sqlx::query_as::<_, RecurringSchedule>(
            r#"
            INSERT INTO recurring_invoices (
                recurring_invoice_id, tenant_id, customer_id, service_overview, start_date, frequency,
                occurrences, subtotal, tax_rate, tax_total, total, notes, next_run_at, template_payload
            )
            SELECT $1, $2, c.customer_id, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14
            FROM customers c
            WHERE c.customer_id = $3 AND ($2::uuid IS NULL OR c.tenant_id = $2)
            RETURNING recurring_invoice_id, tenant_id, customer_id, service_overview, start_date, frequency,
                occurrences, subtotal, tax_rate, tax_total, total, notes, next_run_at, last_run_at,
                template_payload, active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(draft.tenant_id)
        .bind(draft.customer_id)
        .bind(&draft.service_overview)
        .bind(draft.start_date)
        .bind(draft.frequency.as_str())
        .bind(draft.occurrences)
        .bind(draft.subtotal)
        .bind(draft.tax_rate)
        .bind(draft.tax_total)
        .bind(draft.total)
        .bind(&draft.notes)
        .bind(draft.next_run_at)
        .bind(Json(&draft.template))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create recurring invoice: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

        timer.observe_duration();

        Ok(schedule)
    }

    #[instrument(skip(self), fields(scope = %scope, recurring_invoice_id = %recurring_invoice_id))]
    async fn get_schedule(
        &self,
        scope: TenantScope,
        recurring_invoice_id: Uuid,
    ) -> Result<Option<RecurringSchedule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_schedule"])
            .start_timer();

        let schedule = sqlx::query_as::<_, RecurringSchedule>(
            r#"
            SELECT recurring_invoice_id, tenant_id, customer_id, service_overview, start_date, frequency,
                occurrences, subtotal, tax_rate, tax_total, total, notes, next_run_at, last_run_at,
                template_payload, active, created_utc
            FROM recurring_invoices
            WHERE recurring_invoice_id = $2
              AND ($1::uuid IS NULL OR tenant_id = $1)
            "#,
        )
        .bind(scope.tenant_id())
        .bind(recurring_invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get recurring invoice: {}", e))
        })?;

        timer.observe_duration();

        Ok(schedule)
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn list_schedules(&self, scope: TenantScope) -> Result<Vec<ScheduleSummary>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_schedules"])
            .start_timer();

        let schedules = sqlx::query_as::<_, ScheduleSummary>(
            r#"
            SELECT r.recurring_invoice_id, r.tenant_id, r.customer_id, c.company_name AS customer_name,
                r.service_overview, r.frequency, r.occurrences, r.next_run_at, r.last_run_at,
                r.total, r.active
            FROM recurring_invoices r
            LEFT JOIN customers c ON c.customer_id = r.customer_id
                AND (r.tenant_id IS NULL OR c.tenant_id = r.tenant_id)
            WHERE ($1::uuid IS NULL OR r.tenant_id = $1)
            ORDER BY r.next_run_at ASC, r.created_utc ASC
            "#,
        )
        .bind(scope.tenant_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list recurring invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(schedules)
    }

    #[instrument(skip(self), fields(scope = %scope, today = %today))]
    async fn due_schedules(
        &self,
        scope: TenantScope,
        today: NaiveDate,
    ) -> Result<Vec<RecurringSchedule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["due_schedules"])
            .start_timer();

        let schedules = sqlx::query_as::<_, RecurringSchedule>(
            r#"
            SELECT recurring_invoice_id, tenant_id, customer_id, service_overview, start_date, frequency,
                occurrences, subtotal, tax_rate, tax_total, total, notes, next_run_at, last_run_at,
                template_payload, active, created_utc
            FROM recurring_invoices
            WHERE active = TRUE
              AND next_run_at <= $2
              AND ($1::uuid IS NULL OR tenant_id = $1)
            ORDER BY next_run_at ASC, created_utc ASC
            "#,
        )
        .bind(scope.tenant_id())
        .bind(today)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list due recurring invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(schedules)
    }
}
