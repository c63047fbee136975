//! Recurring invoice schedule model.

use super::line_item::{DraftItem, RawItem};
use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Billing frequency of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Lenient parse: anything unrecognized bills monthly.
    pub fn from_string(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Frequency::Weekly,
            "biweekly" => Frequency::Biweekly,
            "quarterly" => Frequency::Quarterly,
            "yearly" => Frequency::Yearly,
            _ => Frequency::Monthly,
        }
    }

    /// Next run date after `from`.
    ///
    /// Month steps clamp to the last day of the target month
    /// (2024-01-31 monthly is followed by 2024-02-29).
    pub fn advance(&self, from: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Weekly => from + Duration::weeks(1),
            Frequency::Biweekly => from + Duration::weeks(2),
            Frequency::Monthly => from + Months::new(1),
            Frequency::Quarterly => from + Months::new(3),
            Frequency::Yearly => from + Months::new(12),
        }
    }
}

/// One line of a schedule's item template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Ordered, versioned item template stored with a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    #[serde(default = "ItemTemplate::current_version")]
    pub version: u32,
    pub items: Vec<TemplateItem>,
}

impl ItemTemplate {
    pub const CURRENT_VERSION: u32 = 1;

    fn current_version() -> u32 {
        Self::CURRENT_VERSION
    }

    pub fn from_items(items: &[DraftItem]) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            items: items
                .iter()
                .map(|item| TemplateItem {
                    description: item.description.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total,
                })
                .collect(),
        }
    }

    /// Rows to feed back into invoice creation. Line totals are recomputed there.
    pub fn to_raw_items(&self) -> Vec<RawItem> {
        self.items
            .iter()
            .map(|item| RawItem::new(item.description.clone(), item.quantity, item.unit_price))
            .collect()
    }
}

/// Recurring invoice schedule row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurringSchedule {
    pub recurring_invoice_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub service_overview: String,
    pub start_date: NaiveDate,
    pub frequency: String,
    pub occurrences: Option<i32>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub next_run_at: NaiveDate,
    pub last_run_at: Option<NaiveDate>,
    pub template_payload: Json<ItemTemplate>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl RecurringSchedule {
    pub fn frequency(&self) -> Frequency {
        Frequency::from_string(&self.frequency)
    }

    pub fn template(&self) -> &ItemTemplate {
        &self.template_payload.0
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.active && self.next_run_at <= today
    }

    /// Run-state after one successful run on `today`.
    pub fn advance(&self, today: NaiveDate) -> ScheduleAdvance {
        let occurrences = self.occurrences.map(|remaining| remaining - 1);
        ScheduleAdvance {
            recurring_invoice_id: self.recurring_invoice_id,
            expected_next_run_at: self.next_run_at,
            last_run_at: today,
            next_run_at: self.frequency().advance(self.next_run_at),
            occurrences,
            active: occurrences.map_or(true, |remaining| remaining > 0),
        }
    }
}

/// Schedule run-state update, applied only together with the invoice it paid for.
///
/// `expected_next_run_at` guards against two runners advancing the same
/// schedule: the update must match it or nothing is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleAdvance {
    pub recurring_invoice_id: Uuid,
    pub expected_next_run_at: NaiveDate,
    pub last_run_at: NaiveDate,
    pub next_run_at: NaiveDate,
    pub occurrences: Option<i32>,
    pub active: bool,
}

/// Row of the schedule listing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleSummary {
    pub recurring_invoice_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub customer_name: Option<String>,
    pub service_overview: String,
    pub frequency: String,
    pub occurrences: Option<i32>,
    pub next_run_at: NaiveDate,
    pub last_run_at: Option<NaiveDate>,
    pub total: Decimal,
    pub active: bool,
}

/// Input for creating a schedule.
#[derive(Debug, Clone)]
pub struct CreateSchedule {
    pub tenant_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub service_overview: String,
    pub start_date: NaiveDate,
    pub next_run_at: Option<NaiveDate>,
    pub frequency: String,
    pub occurrences: Option<i32>,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub items: Vec<RawItem>,
}

/// Validated schedule ready to be persisted.
#[derive(Debug, Clone)]
pub struct ScheduleDraft {
    pub tenant_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub service_overview: String,
    pub start_date: NaiveDate,
    pub next_run_at: NaiveDate,
    pub frequency: Frequency,
    pub occurrences: Option<i32>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub template: ItemTemplate,
}

/// Outcome of one recurring run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecurringRunReport {
    pub created_invoice_ids: Vec<Uuid>,
    pub failures: Vec<ScheduleFailure>,
}

/// A schedule that could not be invoiced in this run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleFailure {
    pub recurring_invoice_id: Uuid,
    pub error: String,
}
