//! Model access.
//!
//! - [`ModelProvider`]: single-shot completion backend
//! - [`OpenRouterProvider`]: HTTP implementation for OpenRouter
//! - [`AgentRouter`]: maps short agent names to models and reports failures in-band

mod openrouter;
pub mod provider;
pub mod router;

pub use openrouter::OpenRouterProvider;
pub use provider::{
    ApiKeySlot, CompletionRequest, CompletionResponse, ModelProvider, PromptMessage, TokenUsage,
};
pub use router::{AgentResponse, AgentRoute, AgentRouter, ROUTES, resolve_route};
