//! Agent routing: short agent names to concrete model calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    ApiKeySlot, CompletionRequest, ModelProvider, PromptMessage, TokenUsage,
};

const CODER_SYSTEM_PROMPT: &str =
    "You are an expert programmer. Provide clean, efficient code solutions.";

/// How one family of agent names is served.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRoute {
    /// Accepted short names, matched case-insensitively.
    pub aliases: &'static [&'static str],
    pub model: &'static str,
    pub key: ApiKeySlot,
    pub system_prompt: Option<&'static str>,
    /// Overrides the configured default temperature.
    pub temperature: Option<f32>,
}

const fn route(aliases: &'static [&'static str], model: &'static str) -> AgentRoute {
    AgentRoute {
        aliases,
        model,
        key: ApiKeySlot::Primary,
        system_prompt: None,
        temperature: None,
    }
}

pub const ROUTES: &[AgentRoute] = &[
    route(&["gpt-4", "gpt-4-turbo"], "openai/gpt-4-turbo"),
    route(&["claude", "claude-3.5-sonnet"], "anthropic/claude-3.5-sonnet"),
    route(&["gemini", "gemini-pro"], "google/gemini-pro"),
    AgentRoute {
        key: ApiKeySlot::Kimi,
        ..route(&["kimi", "kimi-k2"], "moonshotai/kimi-k2:free")
    },
    route(&["llama", "llama-3-70b"], "meta-llama/llama-3-70b-instruct"),
    AgentRoute {
        system_prompt: Some(CODER_SYSTEM_PROMPT),
        temperature: Some(0.1),
        ..route(&["deepseek", "deepseek-coder"], "deepseek/deepseek-coder")
    },
];

/// Find the route for a short agent name.
pub fn resolve_route(agent: &str) -> Option<&'static AgentRoute> {
    let agent = agent.trim();
    ROUTES
        .iter()
        .find(|r| r.aliases.iter().any(|a| a.eq_ignore_ascii_case(agent)))
}

/// Outcome of an agent call. Failures are reported in `error` with empty
/// `content` rather than as an `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub content: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn failed(model: impl Into<String>, error: &LlmError) -> Self {
        Self {
            content: String::new(),
            model: model.into(),
            usage: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Dispatches agent calls to a [`ModelProvider`].
pub struct AgentRouter {
    provider: Arc<dyn ModelProvider>,
    max_tokens: u32,
    temperature: f32,
}

impl AgentRouter {
    pub fn new(provider: Arc<dyn ModelProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// Send `prompt` to the agent named `agent`.
    pub async fn call_agent(&self, agent: &str, prompt: &str) -> AgentResponse {
        let Some(route) = resolve_route(agent) else {
            let err = LlmError::UnknownAgent(agent.to_string());
            tracing::warn!("{}", err);
            return AgentResponse::failed(agent, &err);
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = route.system_prompt {
            messages.push(PromptMessage::system(system));
        }
        messages.push(PromptMessage::user(prompt));

        let request = CompletionRequest::new(route.model, messages)
            .with_max_tokens(self.max_tokens)
            .with_temperature(route.temperature.unwrap_or(self.temperature))
            .with_key(route.key);

        tracing::debug!("Calling agent {} via {}", agent, route.model);

        match self.provider.complete(request).await {
            Ok(response) => AgentResponse {
                content: response.content,
                model: route.model.to_string(),
                usage: response.usage,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Agent {} call failed: {}", agent, e);
                AgentResponse::failed(route.model, &e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubProvider;

    #[test]
    fn test_resolve_route_is_case_insensitive() {
        assert_eq!(
            resolve_route("Claude").map(|r| r.model),
            Some("anthropic/claude-3.5-sonnet")
        );
        assert_eq!(
            resolve_route("GPT-4-TURBO").map(|r| r.model),
            Some("openai/gpt-4-turbo")
        );
        assert!(resolve_route("mistral").is_none());
    }

    #[test]
    fn test_every_alias_is_unique() {
        let mut seen = std::collections::HashSet::new();
        for alias in ROUTES.iter().flat_map(|r| r.aliases.iter()) {
            assert!(seen.insert(alias.to_ascii_lowercase()), "duplicate alias {alias}");
        }
    }

    #[tokio::test]
    async fn test_deepseek_uses_system_prompt_and_low_temperature() {
        let stub = Arc::new(StubProvider::new("fn main() {}"));
        let router = AgentRouter::new(stub.clone(), &LlmConfig::default());

        let response = router.call_agent("deepseek", "write hello world").await;
        assert!(!response.is_error());
        assert_eq!(response.model, "deepseek/deepseek-coder");

        let request = stub.last_request().expect("request recorded");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0], PromptMessage::system(CODER_SYSTEM_PROMPT));
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(1000));
    }

    #[tokio::test]
    async fn test_kimi_uses_its_own_key() {
        let stub = Arc::new(StubProvider::new("hi"));
        let router = AgentRouter::new(stub.clone(), &LlmConfig::default());
        router.call_agent("kimi-k2", "hello").await;
        let request = stub.last_request().unwrap();
        assert_eq!(request.key, ApiKeySlot::Kimi);
        assert_eq!(request.temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_provider_failure_is_in_band() {
        let stub = Arc::new(StubProvider::failing());
        let router = AgentRouter::new(stub.clone(), &LlmConfig::default());
        let response = router.call_agent("claude", "ping").await;
        assert!(response.is_error());
        assert!(response.content.is_empty());
        assert_eq!(stub.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_agent_is_in_band() {
        let stub = Arc::new(StubProvider::new("unused"));
        let router = AgentRouter::new(stub.clone(), &LlmConfig::default());
        let response = router.call_agent("mistral", "ping").await;
        assert_eq!(response.error.as_deref(), Some("Unknown agent: mistral"));
        assert_eq!(stub.calls(), 0);
    }
}
