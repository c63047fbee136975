//! Payment model for invoicing-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment recorded against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}
