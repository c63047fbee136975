use crate::models::{
    CreateInvoice, InvoiceStatus, ListInvoicesFilter, RawItem, RecordPayment, TenantScope,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub tax_rate: Decimal,
    pub status: Option<String>,
    #[validate(length(min = 3, max = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    #[validate(length(max = 4000, message = "Notes are too long"))]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

impl CreateInvoiceRequest {
    /// The invoice belongs to the caller's tenant; the global view creates
    /// tenantless invoices.
    pub fn into_input(self, scope: TenantScope) -> CreateInvoice {
        CreateInvoice {
            tenant_id: scope.tenant_id(),
            customer_id: self.customer_id,
            issue_date: self.issue_date,
            due_date: self.due_date,
            tax_rate: self.tax_rate,
            status: self.status,
            currency: self.currency,
            notes: self.notes,
            recurring_invoice_id: None,
            items: self.items,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub customer_id: Option<Uuid>,
}

impl TryFrom<ListInvoicesQuery> for ListInvoicesFilter {
    type Error = AppError;

    fn try_from(query: ListInvoicesQuery) -> Result<Self, Self::Error> {
        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(status) => Some(status.parse::<InvoiceStatus>()?),
        };

        Ok(ListInvoicesFilter {
            status,
            customer_id: query.customer_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub payment_date: Option<NaiveDate>,
    #[validate(length(max = 100, message = "Method is too long"))]
    pub method: Option<String>,
    #[validate(length(max = 255, message = "Reference is too long"))]
    pub reference: Option<String>,
    #[validate(length(max = 4000, message = "Notes are too long"))]
    pub notes: Option<String>,
}

impl RecordPaymentRequest {
    /// `payment_date` defaults to `today`.
    pub fn into_input(self, invoice_id: Uuid, today: NaiveDate) -> RecordPayment {
        RecordPayment {
            invoice_id,
            amount: self.amount,
            payment_date: self.payment_date.unwrap_or(today),
            method: self.method,
            reference: self.reference,
            notes: self.notes,
        }
    }
}
