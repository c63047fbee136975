//! Invoice line item model for invoicing-service.

use crate::money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use uuid::Uuid;

/// Stored line item. Immutable once its invoice is created.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Caller-supplied item row, possibly blank or invalid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
}

impl RawItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }
}

/// Item that survived filtering, numbered and priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Trim, clamp and filter raw rows.
///
/// Rows with an empty description, or a quantity or unit price that is not
/// strictly positive, are dropped without error. Survivors are numbered
/// 1..=n in their input order. A surviving row whose line total does not
/// fit a stored amount is rejected.
pub fn sanitize_items(raw: &[RawItem]) -> Result<Vec<DraftItem>, AppError> {
    raw.iter()
        .filter_map(|item| {
            let description = item.description.trim();
            let quantity = item.quantity.max(Decimal::ZERO);
            let unit_price = item.unit_price.max(Decimal::ZERO);

            if description.is_empty() || quantity <= Decimal::ZERO || unit_price <= Decimal::ZERO {
                return None;
            }

            Some((description.to_string(), quantity, unit_price))
        })
        .enumerate()
        .map(|(index, (description, quantity, unit_price))| {
            let position = index as i32 + 1;
            let line_total = money::line_total(quantity, unit_price).ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Line item {} amount is out of range",
                    position
                ))
            })?;

            Ok(DraftItem {
                position,
                description,
                quantity,
                unit_price,
                line_total,
            })
        })
        .collect()
}
