//! Prompt templates and the prompt tester.

pub mod template;
pub mod tester;

pub use template::{extract_variables, render};
pub use tester::{PromptTester, TestMetrics, TestResult, TestSummary, summarize};
