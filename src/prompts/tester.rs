//! Prompt benchmarking against agents.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tokio::time::Instant;

use crate::llm::AgentRouter;
use crate::models::new_id;
use crate::prompts::template;

const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_MODEL_DELAY: Duration = Duration::from_millis(1000);

/// Models offered for side-by-side comparison.
pub const COMPARISON_MODELS: &[&str] = &[
    "claude-3.5-sonnet",
    "gpt-4-turbo",
    "gemini-pro",
    "deepseek-coder",
    "kimi-k2",
];

/// Price per 1K tokens for a model short name.
pub fn cost_per_1k_tokens(model: &str) -> Decimal {
    match model {
        "claude-3.5-sonnet" => dec!(0.003),
        "gpt-4-turbo" => dec!(0.01),
        "gemini-pro" => dec!(0.0005),
        "deepseek-coder" => dec!(0.0014),
        "kimi-k2" => Decimal::ZERO,
        _ => dec!(0.001),
    }
}

pub fn estimate_cost(model: &str, tokens: u32) -> Decimal {
    cost_per_1k_tokens(model) * Decimal::from(tokens) / dec!(1000)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetrics {
    pub response_time_ms: u64,
    pub token_count: u32,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub prompt: String,
    pub response: String,
    pub metrics: TestMetrics,
}

impl TestResult {
    pub fn is_error(&self) -> bool {
        self.response.starts_with("Error: ")
    }
}

/// Aggregate over a set of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub runs: usize,
    pub average_response_time_ms: u64,
    pub total_tokens: u64,
    pub total_cost: Decimal,
}

pub fn summarize(results: &[TestResult]) -> TestSummary {
    let runs = results.len();
    let total_time: u64 = results.iter().map(|r| r.metrics.response_time_ms).sum();
    TestSummary {
        runs,
        average_response_time_ms: if runs == 0 { 0 } else { total_time / runs as u64 },
        total_tokens: results.iter().map(|r| r.metrics.token_count as u64).sum(),
        total_cost: results.iter().map(|r| r.metrics.cost).sum(),
    }
}

/// Runs rendered prompts through the router and measures each call.
pub struct PromptTester {
    router: Arc<AgentRouter>,
    batch_delay: Duration,
    model_delay: Duration,
}

impl PromptTester {
    pub fn new(router: Arc<AgentRouter>) -> Self {
        Self {
            router,
            batch_delay: DEFAULT_BATCH_DELAY,
            model_delay: DEFAULT_MODEL_DELAY,
        }
    }

    /// Pause between repeated runs against one model.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Pause between models in [`run_across`](Self::run_across).
    pub fn with_model_delay(mut self, delay: Duration) -> Self {
        self.model_delay = delay;
        self
    }

    /// Render `template` once and call `model` `batch_size` times in sequence.
    pub async fn run<I, K, V>(
        &self,
        model: &str,
        template_text: &str,
        vars: I,
        batch_size: usize,
    ) -> Vec<TestResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prompt = template::render(template_text, vars);
        let mut results = Vec::with_capacity(batch_size);
        for i in 0..batch_size {
            tracing::debug!("Prompt test {} of {} against {}", i + 1, batch_size, model);
            results.push(self.run_single(model, &prompt).await);
            if i + 1 < batch_size {
                tokio::time::sleep(self.batch_delay).await;
            }
        }
        results
    }

    /// Render `template` once and call each model in turn.
    pub async fn run_across<I, K, V>(
        &self,
        models: &[&str],
        template_text: &str,
        vars: I,
    ) -> Vec<TestResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prompt = template::render(template_text, vars);
        let mut results = Vec::with_capacity(models.len());
        for (i, model) in models.iter().enumerate() {
            results.push(self.run_single(model, &prompt).await);
            if i + 1 < models.len() {
                tokio::time::sleep(self.model_delay).await;
            }
        }
        results
    }

    async fn run_single(&self, model: &str, prompt: &str) -> TestResult {
        let started = Instant::now();
        let response = self.router.call_agent(model, prompt).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let (text, tokens) = match response.error {
            Some(error) => (format!("Error: {}", error), 0),
            None => (
                response.content,
                response.usage.map(|u| u.total_tokens).unwrap_or(0),
            ),
        };

        TestResult {
            id: new_id("test"),
            timestamp: Utc::now(),
            model: model.to_string(),
            prompt: prompt.to_string(),
            response: text,
            metrics: TestMetrics {
                response_time_ms,
                token_count: tokens,
                cost: estimate_cost(model, tokens),
            },
        }
    }
}
