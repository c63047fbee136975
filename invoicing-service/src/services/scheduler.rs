//! Periodic trigger for the recurring run.

use crate::models::TenantScope;
use crate::services::recurring::RecurringEngine;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Run due schedules for every tenant on a fixed interval, forever.
///
/// The first tick fires immediately. Errors are logged and the loop keeps
/// going; individual schedule failures are already isolated by the engine.
pub async fn run_recurring_scheduler(engine: RecurringEngine, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Recurring scheduler started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match engine.run_due_schedules(TenantScope::Global).await {
            Ok(report) if !report.failures.is_empty() => {
                error!(
                    created = report.created_invoice_ids.len(),
                    failed = report.failures.len(),
                    "Recurring run finished with failures"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Recurring run could not load due schedules");
            }
        }
    }
}
