//! Services module for invoicing-service.

pub mod clock;
pub mod database;
pub mod invoices;
pub mod memory;
pub mod metrics;
pub mod recurring;
pub mod scheduler;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use database::Database;
pub use invoices::{prepare_invoice, InvoiceService};
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use recurring::{prepare_schedule, RecurringEngine};
pub use scheduler::run_recurring_scheduler;
pub use store::InvoiceStore;
