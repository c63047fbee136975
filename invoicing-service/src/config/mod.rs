//! Configuration module for invoicing-service.
//!
//! Values come from `INVOICING__*` environment variables (nested keys use
//! `__`, e.g. `INVOICING__DATABASE__URL`), an optional `configuration` file
//! and `.env`, falling back to the defaults below.

use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Without a URL the service keeps its data in process memory.
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let settings = core_config::layered_builder("INVOICING")
            .set_default("port", 3006)?
            .set_default("service_name", "invoicing-service")?
            .set_default("service_version", env!("CARGO_PKG_VERSION"))?
            .set_default("log_level", "info")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.run_migrations", true)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.interval_secs", 300)?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
