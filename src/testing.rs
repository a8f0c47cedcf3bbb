//! Test utilities.
//!
//! - [`StubProvider`]: a configurable model provider that returns a fixed response
//! - [`TestHarnessBuilder`]: builder for wiring the services with in-memory defaults
//! - [`TestHarness`]: the assembled components ready for use in tests
//!
//! # Usage
//!
//! ```rust,no_run
//! use command_center::testing::TestHarnessBuilder;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = TestHarnessBuilder::new().build();
//!     // use harness.data, harness.chat, harness.store, etc.
//! }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::ChatService;
use crate::config::{CacheConfig, GateConfig, LlmConfig, SeedConfig};
use crate::data::{DataService, RequestGate, ResultCache};
use crate::db::InMemoryStore;
use crate::error::LlmError;
use crate::llm::{AgentRouter, CompletionRequest, CompletionResponse, ModelProvider, TokenUsage};

/// A configurable model provider stub for tests.
///
/// Records every request, counts calls, and can be switched into a failing
/// mode at runtime.
pub struct StubProvider {
    response: String,
    call_count: AtomicU32,
    should_fail: AtomicBool,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl StubProvider {
    /// Create a new stub that returns the given response.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            call_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            last_request: Mutex::new(None),
        }
    }

    /// Create a stub that always fails with a request error.
    pub fn failing() -> Self {
        let stub = Self::new(String::new());
        stub.set_failing(true);
        stub
    }

    /// Number of times `complete` was called.
    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Toggle whether calls should fail at runtime.
    pub fn set_failing(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new("OK")
    }
}

#[async_trait]
impl ModelProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let model = request.model.clone();
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(LlmError::RequestFailed {
                provider: "stub".to_string(),
                reason: "server error".to_string(),
            });
        }
        Ok(CompletionResponse {
            content: self.response.clone(),
            model,
            usage: Some(TokenUsage::new(10, 5)),
        })
    }
}

/// Assembled test components.
pub struct TestHarness {
    /// Direct handle on the backing store, for inspection and failure injection.
    pub store: Arc<InMemoryStore>,
    pub gate: Arc<RequestGate>,
    pub cache: Arc<ResultCache>,
    pub provider: Arc<StubProvider>,
    pub router: Arc<AgentRouter>,
    pub data: Arc<DataService>,
    pub chat: ChatService,
}

/// Builder for constructing a [`TestHarness`].
///
/// Defaults work without any external services:
/// - Store: [`InMemoryStore`]
/// - Gate: no spacing, no rate-limit fallback wait
/// - Cache: default five minute TTL
/// - Provider: [`StubProvider`] returning "OK"
/// - Seeding: no delay between writes
pub struct TestHarnessBuilder {
    gate: GateConfig,
    cache_ttl: Option<Duration>,
    provider: Option<Arc<StubProvider>>,
}

impl TestHarnessBuilder {
    pub fn new() -> Self {
        Self {
            gate: GateConfig::unthrottled(),
            cache_ttl: None,
            provider: None,
        }
    }

    /// Override the gate configuration.
    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Override the model provider.
    pub fn with_provider(mut self, provider: Arc<StubProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn build(self) -> TestHarness {
        let store = Arc::new(InMemoryStore::new());
        let gate = Arc::new(RequestGate::new(self.gate));
        let cache = Arc::new(match self.cache_ttl {
            Some(ttl) => ResultCache::with_ttl(ttl),
            None => ResultCache::new(&CacheConfig::default()),
        });
        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(StubProvider::default()));
        let router = Arc::new(AgentRouter::new(provider.clone(), &LlmConfig::default()));
        let data = Arc::new(DataService::new(
            store.clone(),
            gate.clone(),
            cache.clone(),
            SeedConfig {
                delay: Duration::ZERO,
            },
        ));
        let chat = ChatService::new(data.clone(), router.clone());

        TestHarness {
            store,
            gate,
            cache,
            provider,
            router,
            data,
            chat,
        }
    }
}

impl Default for TestHarnessBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptMessage;

    #[tokio::test]
    async fn test_stub_records_requests() {
        let stub = StubProvider::new("pong");
        let response = stub
            .complete(CompletionRequest::new("m", vec![PromptMessage::user("ping")]))
            .await
            .unwrap();
        assert_eq!(response.content, "pong");
        assert_eq!(stub.calls(), 1);
        assert_eq!(stub.last_request().unwrap().messages[0].content, "ping");

        stub.set_failing(true);
        assert!(
            stub.complete(CompletionRequest::new("m", vec![]))
                .await
                .is_err()
        );
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn test_harness_builds_with_defaults() {
        let harness = TestHarnessBuilder::new().build();
        assert_eq!(harness.router.provider().name(), "stub");
        assert!(harness.data.list_agents("u1").await.unwrap().is_empty());
        assert_eq!(harness.store.operations(), 1);
        assert_eq!(harness.gate.dispatch_count(), 1);
    }
}
