//! Invoicing core: invoices, payments and recurring billing for
//! multi-tenant small-business operations.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod money;
pub mod numbering;
pub mod services;
pub mod startup;
pub mod utils;
