//! Default agents and prompts created for a new user.

use rust_decimal_macros::dec;

use crate::models::{AgentStatus, NewAgent, NewSystemPrompt};

/// Result of [`DataService::initialize_default_data`](super::DataService::initialize_default_data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The initialized marker was still cached.
    AlreadyInitialized,
    /// The user already had agents; nothing was written.
    ExistingData,
    /// Defaults were written.
    Seeded { agents: usize, prompts: usize },
    /// The backend rate limited seeding; it will be attempted again next start.
    Deferred,
}

pub fn default_agents() -> Vec<NewAgent> {
    vec![
        NewAgent::new("GPT-4 Turbo", "OpenAI", "openai/gpt-4-turbo")
            .with_status(AgentStatus::Connected)
            .with_metrics(8.9, 48.0, 99.2)
            .with_context("128K")
            .with_capabilities(["Multimodal", "Code Generation", "Function Calling", "JSON Mode"])
            .with_cost(dec!(0.03)),
        NewAgent::new("Claude 3.5 Sonnet", "Anthropic", "anthropic/claude-3.5-sonnet")
            .with_status(AgentStatus::Connected)
            .with_metrics(9.5, 42.0, 99.5)
            .with_context("200K")
            .with_capabilities(["Text Analysis", "Code Generation", "Reasoning", "Creative Writing"])
            .with_cost(dec!(0.015)),
        NewAgent::new("Gemini Pro", "Google", "google/gemini-pro")
            .with_status(AgentStatus::Connected)
            .with_metrics(8.5, 51.0, 98.8)
            .with_context("1M")
            .with_capabilities(["Multimodal", "Long Context", "Code Generation", "Reasoning"])
            .with_cost(dec!(0.0005)),
        NewAgent::new("KIMI K2", "Moonshot AI", "moonshotai/kimi-k2:free")
            .with_status(AgentStatus::Connected)
            .with_metrics(8.8, 45.0, 98.1)
            .with_context("200K")
            .with_capabilities(["Long Context", "Multilingual", "Text Analysis", "Free Tier"])
            .with_cost(dec!(0.0)),
    ]
}

pub fn default_prompts() -> Vec<NewSystemPrompt> {
    let prompt = |name: &str, description: &str, template: &str, category: &str, tags: [&str; 3]| {
        NewSystemPrompt {
            name: name.to_string(),
            description: description.to_string(),
            template: template.to_string(),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    };

    vec![
        prompt(
            "Code Assistant",
            "Expert programming assistant for code generation and review",
            "You are an expert programmer. Provide clean, efficient, and well-documented code \
             solutions. Always include error handling and follow best practices.",
            "development",
            ["coding", "programming", "development"],
        ),
        prompt(
            "Creative Writer",
            "Creative writing assistant for stories, articles, and content",
            "You are a creative writing assistant. Help users craft engaging stories, articles, \
             and creative content with vivid descriptions and compelling narratives.",
            "creative",
            ["writing", "creative", "content"],
        ),
        prompt(
            "Data Analyst",
            "Data analysis and insights generation assistant",
            "You are a data analyst expert. Analyze data, identify patterns, generate insights, \
             and provide actionable recommendations based on the information provided.",
            "analysis",
            ["data", "analysis", "insights"],
        ),
    ]
}
