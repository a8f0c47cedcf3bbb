use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api";
const DEFAULT_REFERER: &str = "https://ai-agent-command-center.local";
const DEFAULT_TITLE: &str = "AI Agent Command Center";

/// Model gateway configuration (OpenRouter-compatible endpoint).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the chat completions API.
    pub base_url: String,
    /// Key used for every route except Kimi.
    pub api_key: Option<SecretString>,
    /// Separate key used for the Kimi route.
    pub kimi_api_key: Option<SecretString>,
    /// Value of the `HTTP-Referer` attribution header.
    pub referer: String,
    /// Value of the `X-Title` attribution header.
    pub title: String,
    /// Default completion length.
    pub max_tokens: u32,
    /// Default sampling temperature.
    pub temperature: f32,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            kimi_api_key: None,
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
        }
    }
}

impl LlmConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let temperature: f32 = parse_optional_env("LLM_TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TEMPERATURE".to_string(),
                message: format!("must be between 0.0 and 2.0, got {temperature}"),
            });
        }

        Ok(Self {
            base_url: optional_env("OPENROUTER_BASE_URL")?
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: optional_env("OPENROUTER_API_KEY")?.map(SecretString::from),
            kimi_api_key: optional_env("KIMI_API_KEY")?.map(SecretString::from),
            referer: optional_env("OPENROUTER_REFERER")?
                .unwrap_or_else(|| DEFAULT_REFERER.to_string()),
            title: optional_env("OPENROUTER_TITLE")?.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            max_tokens: parse_optional_env("LLM_MAX_TOKENS", 1000)?,
            temperature,
            timeout: Duration::from_secs(parse_optional_env("LLM_TIMEOUT_SECS", 120)?),
        })
    }
}
