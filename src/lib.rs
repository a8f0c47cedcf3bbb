//! Command Center core.
//!
//! Backend services behind the AI Agent Command Center dashboard:
//!
//! - [`data`]: gated, cached access to the record store (agents, workflows,
//!   system prompts, projects, chat messages)
//! - [`llm`]: model providers and the agent routing table
//! - [`chat`]: chat orchestration with persistence of both sides
//! - [`prompts`]: prompt templates and the batch prompt tester
//! - [`pipeline`]: the simulated deployment pipeline

pub mod chat;
pub mod cli;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod testing;

pub use config::Config;
pub use error::{Error, Result};
