//! Human-readable invoice numbers.
//!
//! The underlying sequence is a single counter shared by all tenants and is
//! never reset per year, so numbers within one year need not be contiguous.
//! Allocation happens inside the store's creation transaction (a database
//! sequence in Postgres); this module only formats.

/// Prefix of every invoice number.
pub const INVOICE_NUMBER_PREFIX: &str = "INV";

/// `INV-{year}-{sequence:04}`. Sequences above 9999 simply widen.
pub fn format_invoice_number(sequence: i64, year: i32) -> String {
    format!("{}-{}-{:04}", INVOICE_NUMBER_PREFIX, year, sequence)
}
