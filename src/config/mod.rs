//! Configuration.
//!
//! Everything is resolved from environment variables. Call
//! `dotenvy::dotenv()` before [`Config::from_env`] to pick up a `.env` file.

mod data;
mod database;
pub(crate) mod helpers;
mod llm;
mod pipeline;

use std::path::PathBuf;

pub use data::{CacheConfig, GateConfig, SeedConfig};
pub use database::{DatabaseBackend, DatabaseConfig, default_libsql_path};
pub use llm::LlmConfig;
pub use pipeline::PipelineConfig;

use crate::error::ConfigError;

/// Base directory for local state (~/.command-center).
pub fn base_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".command-center")
}

/// Full application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gate: GateConfig,
    pub cache: CacheConfig,
    pub seed: SeedConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::resolve()?,
            gate: GateConfig::resolve()?,
            cache: CacheConfig::resolve()?,
            seed: SeedConfig::resolve()?,
            llm: LlmConfig::resolve()?,
            pipeline: PipelineConfig::resolve()?,
        })
    }
}
