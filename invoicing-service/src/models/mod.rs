//! Domain models for invoicing-service.

mod invoice;
mod line_item;
mod payment;
mod recurring;
mod tenant;

pub use invoice::{
    CreateInvoice, Invoice, InvoiceDetail, InvoiceDraft, InvoiceStatus, InvoiceSummary,
    ListInvoicesFilter, DEFAULT_CURRENCY,
};
pub use line_item::{sanitize_items, DraftItem, InvoiceItem, RawItem};
pub use payment::{Payment, RecordPayment};
pub use recurring::{
    CreateSchedule, Frequency, ItemTemplate, RecurringRunReport, RecurringSchedule,
    ScheduleAdvance, ScheduleDraft, ScheduleFailure, ScheduleSummary, TemplateItem,
};
pub use tenant::TenantScope;
