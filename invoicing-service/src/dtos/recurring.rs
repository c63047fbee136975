use crate::models::{CreateSchedule, RawItem, TenantScope};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

fn default_frequency() -> String {
    "monthly".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScheduleRequest {
    pub customer_id: Uuid,
    #[validate(length(max = 500, message = "Service overview is too long"))]
    pub service_overview: String,
    pub start_date: NaiveDate,
    pub next_run_at: Option<NaiveDate>,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    pub occurrences: Option<i32>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[validate(length(max = 4000, message = "Notes are too long"))]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

impl CreateScheduleRequest {
    pub fn into_input(self, scope: TenantScope) -> CreateSchedule {
        CreateSchedule {
            tenant_id: scope.tenant_id(),
            customer_id: self.customer_id,
            service_overview: self.service_overview,
            start_date: self.start_date,
            next_run_at: self.next_run_at,
            frequency: self.frequency,
            occurrences: self.occurrences,
            tax_rate: self.tax_rate,
            notes: self.notes,
            items: self.items,
        }
    }
}
