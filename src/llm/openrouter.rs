//! OpenRouter Chat Completions provider.
//!
//! Talks to any OpenAI-compatible `/v1/chat/completions` endpoint and adds
//! OpenRouter's attribution headers. Requests are single-shot; retry policy
//! belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    ApiKeySlot, CompletionRequest, CompletionResponse, ModelProvider, PromptMessage, TokenUsage,
};

const PROVIDER: &str = "openrouter";
const MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024; // 10 MB

/// OpenRouter provider over `/v1/chat/completions`.
pub struct OpenRouterProvider {
    client: Client,
    config: LlmConfig,
}

impl OpenRouterProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');

        if base.ends_with("/v1") {
            format!("{}/{}", base, path)
        } else {
            format!("{}/v1/{}", base, path)
        }
    }

    fn api_key(&self, slot: ApiKeySlot) -> Result<&SecretString, LlmError> {
        let key = match slot {
            ApiKeySlot::Primary => self.config.api_key.as_ref(),
            ApiKeySlot::Kimi => self.config.kimi_api_key.as_ref(),
        };
        key.ok_or_else(|| LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        })
    }

    async fn send_request(
        &self,
        key: &SecretString,
        body: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let url = self.api_url("chat/completions");
        tracing::debug!("Sending request to OpenRouter: {} (model {})", url, body.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", key.expose_secret()))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if response.content_length().unwrap_or(0) > MAX_RESPONSE_BYTES {
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Response too large (max {} bytes)", MAX_RESPONSE_BYTES),
            });
        }
        let retry_after = parse_retry_after(response.headers());
        let response_text = response.text().await.unwrap_or_default();

        tracing::debug!("OpenRouter response status: {}", status);

        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed {
                    provider: PROVIDER.to_string(),
                },
                429 => {
                    tracing::warn!("OpenRouter rate limited the request");
                    LlmError::RateLimited {
                        provider: PROVIDER.to_string(),
                        retry_after,
                    }
                }
                _ => LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: format!("HTTP {}: {}", status, truncate(&response_text, 500)),
                },
            });
        }

        serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("JSON parse error: {}. Raw: {}", e, truncate(&response_text, 500)),
        })
    }
}

#[async_trait]
impl ModelProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let key = self.api_key(request.key)?;
        let body = ChatCompletionRequest {
            model: request.model,
            messages: request.messages,
            max_tokens: Some(request.max_tokens.unwrap_or(self.config.max_tokens)),
            temperature: Some(request.temperature.unwrap_or(self.config.temperature)),
        };

        let response = self.send_request(key, &body).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "No choices in response".to_string(),
            })?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or(body.model),
            usage: response.usage.as_ref().map(parse_usage),
        })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn saturate_u32(val: u64) -> u32 {
    val.min(u32::MAX as u64) as u32
}

/// Map the provider's usage block, tolerating missing fields.
fn parse_usage(usage: &ChatCompletionUsage) -> TokenUsage {
    let prompt = usage.prompt_tokens.map(saturate_u32).unwrap_or(0);
    let completion = match (usage.completion_tokens, usage.total_tokens) {
        (Some(completion), _) => saturate_u32(completion),
        (None, Some(total)) => {
            tracing::warn!(
                total_tokens = total,
                "OpenRouter usage missing completion_tokens; deriving from total"
            );
            saturate_u32(total.saturating_sub(usage.prompt_tokens.unwrap_or(0)))
        }
        (None, None) => 0,
    };
    let total = usage
        .total_tokens
        .map(saturate_u32)
        .unwrap_or_else(|| prompt.saturating_add(completion));

    TokenUsage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: total,
    }
}

// OpenAI-compatible Chat Completions API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<PromptMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}
