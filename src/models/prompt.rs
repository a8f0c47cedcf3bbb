use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::prompts::template;

/// A reusable prompt template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPrompt {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Body text; may contain `{variable}` placeholders.
    pub template: String,
    pub category: String,
    pub tags: Vec<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemPrompt {
    /// Placeholder names used by the template, in first-seen order.
    pub fn variables(&self) -> Vec<String> {
        template::extract_variables(&self.template)
    }
}

/// Fields supplied when creating a system prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSystemPrompt {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update of a system prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPromptUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub template: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}
