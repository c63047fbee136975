//! Invoice creation, lookup, status changes and payments.

use crate::models::{
    sanitize_items, CreateInvoice, DraftItem, Invoice, InvoiceDetail, InvoiceDraft, InvoiceStatus,
    InvoiceSummary, ListInvoicesFilter, Payment, RecordPayment, ScheduleAdvance, TenantScope,
    DEFAULT_CURRENCY,
};
use crate::money::{self, Totals};
use crate::services::clock::Clock;
use crate::services::metrics;
use crate::services::store::InvoiceStore;
use chrono::Datelike;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Validate and price an invoice request without touching storage.
///
/// Blank and non-positive item rows are dropped; what remains is numbered
/// 1..=n and totalled. A negative tax rate is treated as zero.
pub fn prepare_invoice(input: &CreateInvoice) -> Result<InvoiceDraft, AppError> {
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

    let status = match input.status.as_deref().map(str::trim) {
        None | Some("") => InvoiceStatus::default(),
        Some(status) => status.parse()?,
    };

    let currency = input
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let tax_rate = clamp_tax_rate(input.tax_rate)?;
    let totals = price_items(&items, tax_rate)?;

    Ok(InvoiceDraft {
        tenant_id: input.tenant_id,
        customer_id: input.customer_id,
        recurring_invoice_id: input.recurring_invoice_id,
        issue_date: input.issue_date,
        due_date: input.due_date,
        status,
        currency,
        subtotal: totals.subtotal,
        tax_rate,
        tax_total: totals.tax_total,
        total: totals.total,
        notes: trim_optional(input.notes.as_deref()),
        items,
    })
}

/// Negative rates count as zero; rates beyond the stored precision are rejected.
pub(crate) fn clamp_tax_rate(tax_rate: Decimal) -> Result<Decimal, AppError> {
    let tax_rate = tax_rate.max(Decimal::ZERO);
    if tax_rate > money::MAX_TAX_RATE_PERCENT {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Tax rate must not exceed {}",
            money::MAX_TAX_RATE_PERCENT
        )));
    }
    Ok(tax_rate)
}

pub(crate) fn price_items(items: &[DraftItem], tax_rate: Decimal) -> Result<Totals, AppError> {
    Totals::from_lines(items.iter().map(|item| item.line_total), tax_rate)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invoice total is out of range")))
}

/// Trimmed text, with blank collapsing to `None`.
pub(crate) fn trim_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Invoice operations over a store.
#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn InvoiceStore>,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn InvoiceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create an invoice with its items in one unit of work.
    ///
    /// The number's year is the current calendar year, not the issue date's.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let draft = prepare_invoice(input)?;
        self.persist(&draft, None).await
    }

    /// Persist an already prepared draft, optionally advancing its schedule
    /// in the same unit of work.
    pub(crate) async fn persist(
        &self,
        draft: &InvoiceDraft,
        advance: Option<&ScheduleAdvance>,
    ) -> Result<Invoice, AppError> {
        let year = self.clock.today().year();
        let invoice = self.store.insert_invoice(draft, year, advance).await?;

        let source = if advance.is_some() { "recurring" } else { "manual" };
        metrics::record_invoice_created(&invoice.status, source, &invoice.currency, invoice.total);

        Ok(invoice)
    }

    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn get_invoice(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, AppError> {
        self.store
            .get_invoice(scope, invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))
    }

    #[instrument(skip(self, filter), fields(scope = %scope))]
    pub async fn list_invoices(
        &self,
        scope: TenantScope,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<InvoiceSummary>, AppError> {
        self.store.list_invoices(scope, filter).await
    }

    /// Overwrite the status. Any known status may follow any other.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn update_status(
        &self,
        scope: TenantScope,
        invoice_id: Uuid,
        status: &str,
    ) -> Result<(), AppError> {
        let status: InvoiceStatus = status.parse()?;

        if !self
            .store
            .update_invoice_status(scope, invoice_id, status)
            .await?
        {
            return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
        }

        info!(invoice_id = %invoice_id, status = status.as_str(), "Invoice status updated");
        Ok(())
    }

    /// Record a payment regardless of the invoice's status.
    #[instrument(skip(self, input), fields(scope = %scope, invoice_id = %input.invoice_id))]
    pub async fn record_payment(
        &self,
        scope: TenantScope,
        input: &RecordPayment,
    ) -> Result<Payment, AppError> {
        let amount = money::checked_money(input.amount).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Payment amount is out of range"))
        })?;
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be greater than zero"
            )));
        }

        let input = RecordPayment {
            amount,
            method: trim_optional(input.method.as_deref()),
            reference: trim_optional(input.reference.as_deref()),
            notes: trim_optional(input.notes.as_deref()),
            ..input.clone()
        };

        let payment = self
            .store
            .insert_payment(scope, &input)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        metrics::record_payment(payment.method.as_deref(), payment.amount);

        info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            "Payment recorded"
        );

        Ok(payment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawItem;
    use chrono::NaiveDate;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn input(items: Vec<RawItem>) -> CreateInvoice {
        CreateInvoice {
            tenant_id: None,
            customer_id: Uuid::new_v4(),
            issue_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            tax_rate: d("19"),
            status: None,
            currency: None,
            notes: None,
            recurring_invoice_id: None,
            items,
        }
    }

    #[test]
    fn test_prepare_invoice_totals() {
        let draft = prepare_invoice(&input(vec![
            RawItem::new("A", d("2"), d("10")),
            RawItem::new("", d("1"), d("5")),
            RawItem::new("B", d("0"), d("5")),
            RawItem::new("C", d("1"), d("-1")),
        ]))
        .unwrap();

        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.subtotal, d("20.00"));
        assert_eq!(draft.tax_total, d("3.80"));
        assert_eq!(draft.total, d("23.80"));
        assert_eq!(draft.status, InvoiceStatus::Open);
        assert_eq!(draft.currency, "EUR");
    }

    #[test]
    fn test_prepare_invoice_rejects_empty_and_all_invalid() {
        assert!(matches!(
            prepare_invoice(&input(vec![])),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            prepare_invoice(&input(vec![RawItem::new("  ", d("1"), d("1"))])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_prepare_invoice_clamps_negative_tax_rate() {
        let mut request = input(vec![RawItem::new("A", d("1"), d("100"))]);
        request.tax_rate = d("-5");

        let draft = prepare_invoice(&request).unwrap();

        assert_eq!(draft.tax_rate, Decimal::ZERO);
        assert_eq!(draft.tax_total, Decimal::ZERO);
        assert_eq!(draft.total, d("100.00"));
    }

    #[test]
    fn test_prepare_invoice_status_and_text_fields() {
        let mut request = input(vec![RawItem::new("A", d("1"), d("1"))]);
        request.status = Some("draft".to_string());
        request.currency = Some(" usd ".to_string());
        request.notes = Some("   ".to_string());

        let draft = prepare_invoice(&request).unwrap();
        assert_eq!(draft.status, InvoiceStatus::Draft);
        assert_eq!(draft.currency, "USD");
        assert_eq!(draft.notes, None);

        request.status = Some("archived".to_string());
        assert!(matches!(
            prepare_invoice(&request),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_prepare_invoice_rejects_amounts_beyond_storage() {
        let huge = d("100000000000000000000");
        assert!(matches!(
            prepare_invoice(&input(vec![RawItem::new("A", huge, huge)])),
            Err(AppError::BadRequest(_))
        ));

        // Lines at the limit are fine until tax pushes the total over it.
        let mut request = input(vec![RawItem::new("A", d("1"), money::MAX_AMOUNT)]);
        request.tax_rate = Decimal::ZERO;
        assert_eq!(prepare_invoice(&request).unwrap().total, money::MAX_AMOUNT);

        request.tax_rate = d("19");
        assert!(matches!(
            prepare_invoice(&request),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_prepare_invoice_rejects_oversized_tax_rate() {
        let mut request = input(vec![RawItem::new("A", d("1"), d("1"))]);
        request.tax_rate = money::MAX_TAX_RATE_PERCENT;
        assert!(prepare_invoice(&request).is_ok());

        request.tax_rate = d("1000");
        assert!(matches!(
            prepare_invoice(&request),
            Err(AppError::BadRequest(_))
        ));
    }
}
