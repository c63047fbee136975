//! Request bodies and query strings of the HTTP API.

mod invoice;
mod recurring;

pub use invoice::{
    CreateInvoiceRequest, ListInvoicesQuery, RecordPaymentRequest, UpdateStatusRequest,
};
pub use recurring::CreateScheduleRequest;
