use crate::error::AppError;
use config::{Config as Cfg, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        let config = layered_builder("APP").build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Start a configuration builder with the workspace's standard sources.
///
/// Loads `.env` into the process environment, then layers an optional
/// `configuration.{toml,yaml,json}` file under `<PREFIX>__*` environment
/// variables (`__` separates nested keys).
pub fn layered_builder(prefix: &str) -> ConfigBuilder<DefaultState> {
    dotenvy::dotenv().ok();

    Cfg::builder()
        .add_source(File::with_name("configuration").required(false))
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
}
