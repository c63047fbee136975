//! Invoice model for invoicing-service.

use super::line_item::{DraftItem, InvoiceItem, RawItem};
use super::payment::Payment;
use crate::money;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Currency used when the caller does not name one.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Invoice status.
///
/// Any status may follow any other; the operator is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    #[default]
    Open,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Open,
        InvoiceStatus::Paid,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Invalid invoice status '{}'", s)))
    }
}

/// Invoice header row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub sequence: i64,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub recurring_invoice_id: Option<Uuid>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Invoice {
    /// Parsed status; `None` only if the column holds a value written outside this service.
    pub fn status(&self) -> Option<InvoiceStatus> {
        self.status.parse().ok()
    }
}

/// Invoice with its items, payments and read-time balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub customer_name: Option<String>,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
    pub paid_total: Decimal,
    pub balance_due: Decimal,
}

impl InvoiceDetail {
    /// Assemble a detail view, ordering children and deriving the balance.
    pub fn new(
        invoice: Invoice,
        customer_name: Option<String>,
        mut items: Vec<InvoiceItem>,
        mut payments: Vec<Payment>,
    ) -> Self {
        items.sort_by_key(|item| item.position);
        payments.sort_by(|a, b| {
            b.payment_date
                .cmp(&a.payment_date)
                .then(b.created_utc.cmp(&a.created_utc))
        });

        // Saturates instead of panicking on overflow.
        let paid_total = money::round_money(
            payments
                .iter()
                .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.amount)),
        );
        let balance_due = money::round_money(invoice.total.saturating_sub(paid_total));

        Self {
            invoice,
            customer_name,
            items,
            payments,
            paid_total,
            balance_due,
        }
    }
}

/// Row of the invoice listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceSummary {
    pub invoice_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub sequence: i64,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub customer_name: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: String,
    pub currency: String,
    pub total: Decimal,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub tenant_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub tax_rate: Decimal,
    pub status: Option<String>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub recurring_invoice_id: Option<Uuid>,
    pub items: Vec<RawItem>,
}

/// Validated, fully priced invoice ready to be persisted.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub tenant_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub recurring_invoice_id: Option<Uuid>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub items: Vec<DraftItem>,
}
