//! Request extractors for invoicing-service.

pub mod tenant;
