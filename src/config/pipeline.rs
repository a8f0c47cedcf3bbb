use std::time::Duration;

use crate::config::helpers::parse_optional_env;
use crate::error::ConfigError;

/// Simulated deployment pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Shortest simulated stage duration.
    pub min_stage_duration: Duration,
    /// Longest simulated stage duration.
    pub max_stage_duration: Duration,
    /// Probability in `[0, 1]` that a simulated stage succeeds.
    pub success_rate: f64,
    /// Number of finished runs kept in history.
    pub history_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_stage_duration: Duration::from_secs(10),
            max_stage_duration: Duration::from_secs(40),
            success_rate: 0.9,
            history_limit: 20,
        }
    }
}

impl PipelineConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let min_secs: u64 = parse_optional_env("PIPELINE_MIN_STAGE_SECS", 10)?;
        let max_secs: u64 = parse_optional_env("PIPELINE_MAX_STAGE_SECS", 40)?;
        if max_secs < min_secs {
            return Err(ConfigError::InvalidValue {
                key: "PIPELINE_MAX_STAGE_SECS".to_string(),
                message: format!("must be >= PIPELINE_MIN_STAGE_SECS ({min_secs})"),
            });
        }

        let success_rate: f64 = parse_optional_env("PIPELINE_SUCCESS_RATE", 0.9)?;
        if !(0.0..=1.0).contains(&success_rate) {
            return Err(ConfigError::InvalidValue {
                key: "PIPELINE_SUCCESS_RATE".to_string(),
                message: format!("must be between 0.0 and 1.0, got {success_rate}"),
            });
        }

        Ok(Self {
            min_stage_duration: Duration::from_secs(min_secs),
            max_stage_duration: Duration::from_secs(max_secs),
            success_rate,
            history_limit: parse_optional_env("PIPELINE_HISTORY_LIMIT", 20)?,
        })
    }
}
