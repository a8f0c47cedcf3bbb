use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
}

string_enum!(WorkflowStatus {
    Draft => "draft",
    Active => "active",
    Paused => "paused",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Prompt,
    AgentCall,
    Condition,
    Merge,
}

string_enum!(StepType {
    Prompt => "prompt",
    AgentCall => "agent_call",
    Condition => "condition",
    Merge => "merge",
});

/// Canvas coordinates. Layout only.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// One node of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<serde_json::Value>,
    #[serde(default)]
    pub position: Position,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            step_type,
            agent_id: None,
            prompt: None,
            conditions: None,
            position: Position::default(),
        }
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// A user-authored, non-executing chain of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    pub agents: Vec<String>,
    pub status: WorkflowStatus,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Distinct agent ids referenced by steps, in step order.
    pub fn referenced_agents(&self) -> Vec<String> {
        referenced_agents(&self.steps)
    }

    /// Replace `agents` with the ids referenced by the steps.
    pub fn sync_agents(&mut self) {
        self.agents = self.referenced_agents();
    }
}

/// Distinct agent ids referenced by `steps`, in step order.
pub fn referenced_agents(steps: &[WorkflowStep]) -> Vec<String> {
    let mut seen = Vec::new();
    for id in steps.iter().filter_map(|s| s.agent_id.as_ref()) {
        if !seen.contains(id) {
            seen.push(id.clone());
        }
    }
    seen
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkflow {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub agents: Vec<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
}

impl NewWorkflow {
    /// Build a workflow whose `agents` list is derived from its steps.
    pub fn from_steps(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        let agents = referenced_agents(&steps);
        Self {
            name: name.into(),
            description: String::new(),
            steps,
            agents,
            status: WorkflowStatus::Draft,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<WorkflowStep>>,
    pub agents: Option<Vec<String>>,
    pub status: Option<WorkflowStatus>,
}
