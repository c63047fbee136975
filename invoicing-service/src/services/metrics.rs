//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Invoice counter by status at creation.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoices_total",
        "Total number of invoices created by status",
        &["status", "source"] // source: manual, recurring
    )
    .expect("Failed to register invoices_total")
});

/// Payment counter by method.
pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_payments_total",
        "Total number of payments by payment method",
        &["payment_method"]
    )
    .expect("Failed to register payments_total")
});

/// Recurring schedule runs by outcome.
pub static RECURRING_RUNS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_recurring_runs_total",
        "Total number of recurring schedule runs by outcome",
        &["outcome"] // created, failed
    )
    .expect("Failed to register recurring_runs_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Monetary amount counter by currency.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoice_amount_total",
        "Total invoice amount by currency",
        &["currency"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Payment amount counter by payment method.
pub static PAYMENT_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_payment_amount_total",
        "Total payment amount by payment method",
        &["payment_method"]
    )
    .expect("Failed to register payment_amount_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&RECURRING_RUNS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
    Lazy::force(&PAYMENT_AMOUNT_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

pub fn record_invoice_created(status: &str, source: &str, currency: &str, total: Decimal) {
    INVOICES_TOTAL.with_label_values(&[status, source]).inc();
    INVOICE_AMOUNT_TOTAL
        .with_label_values(&[currency])
        .inc_by(total.to_f64().unwrap_or_default().max(0.0));
}

pub fn record_payment(method: Option<&str>, amount: Decimal) {
    let method = method.unwrap_or("unspecified").to_lowercase();
    PAYMENTS_TOTAL.with_label_values(&[method.as_str()]).inc();
    PAYMENT_AMOUNT_TOTAL
        .with_label_values(&[method.as_str()])
        .inc_by(amount.to_f64().unwrap_or_default().max(0.0));
}

pub fn record_recurring_run(outcome: &str) {
    RECURRING_RUNS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
