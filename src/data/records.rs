//! Storage-boundary record shapes.
//!
//! Each entity has an explicit record type whose field names follow the
//! store's snake_case convention. List and object valued fields cross the
//! boundary as JSON text: [`encode_list`] on the way in, [`decode_list`] on the
//! way out. Decoding never fails a read; a missing, null or malformed value
//! becomes an empty list.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Row;
use crate::error::DatabaseError;
use crate::models::{
    Agent, AgentStatus, AgentUpdate, ChatMessage, Project, ProjectStatus, ProjectType,
    ProjectUpdate, Role, SystemPrompt, SystemPromptUpdate, Workflow, WorkflowStatus, WorkflowStep,
    WorkflowUpdate,
};

/// Timestamps are written as RFC 3339 with millisecond precision so that the
/// text form sorts chronologically.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Encode a list for storage.
pub fn encode_list<T: Serialize>(items: &[T]) -> Result<String, DatabaseError> {
    Ok(serde_json::to_string(items)?)
}

/// Decode a stored list field.
///
/// Accepts the JSON text written by [`encode_list`] as well as an inline JSON
/// array. Anything else yields an empty list.
pub fn decode_list<T: DeserializeOwned>(field: &str, raw: Option<&Value>) -> Vec<T> {
    let parsed = match raw {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::String(text)) if text.trim().is_empty() => return Vec::new(),
        Some(Value::String(text)) => serde_json::from_str::<Vec<T>>(text),
        Some(array @ Value::Array(_)) => serde_json::from_value::<Vec<T>>(array.clone()),
        Some(other) => {
            tracing::warn!("Unexpected stored type for list field '{}': {}", field, other);
            return Vec::new();
        }
    };

    parsed.unwrap_or_else(|e| {
        tracing::warn!("Malformed stored list field '{}': {}", field, e);
        Vec::new()
    })
}

fn encoded<T: Serialize>(items: &[T]) -> Result<Option<Value>, DatabaseError> {
    Ok(Some(Value::String(encode_list(items)?)))
}

/// Serialize a record into a storage row.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row, DatabaseError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::Serialization(format!(
            "record did not serialize to an object: {}",
            other
        ))),
    }
}

/// Deserialize a storage row into a record.
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, DatabaseError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

// ==================== Agents ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub capabilities: Option<Value>,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub reliability: f64,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl AgentRecord {
    pub fn from_model(agent: &Agent) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: agent.id.clone(),
            user_id: agent.user_id.clone(),
            name: agent.name.clone(),
            provider: agent.provider.clone(),
            model: agent.model.clone(),
            status: agent.status,
            accuracy: agent.accuracy,
            speed: agent.speed,
            context: agent.context.clone(),
            capabilities: encoded(&agent.capabilities)?,
            cost: agent.cost,
            reliability: agent.reliability,
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        })
    }

    pub fn into_model(self) -> Agent {
        Agent {
            capabilities: decode_list("capabilities", self.capabilities.as_ref()),
            id: self.id,
            name: self.name,
            provider: self.provider,
            model: self.model,
            status: self.status,
            accuracy: self.accuracy,
            speed: self.speed,
            context: self.context,
            cost: self.cost,
            reliability: self.reliability,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ==================== Workflows ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub agents: Option<Value>,
    #[serde(default)]
    pub steps: Option<Value>,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRecord {
    pub fn from_model(workflow: &Workflow) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: workflow.id.clone(),
            user_id: workflow.user_id.clone(),
            name: workflow.name.clone(),
            description: workflow.description.clone(),
            agents: encoded(&workflow.agents)?,
            steps: encoded(&workflow.steps)?,
            status: workflow.status,
            created_at: workflow.created_at,
            updated_at: workflow.updated_at,
        })
    }

    pub fn into_model(self) -> Workflow {
        Workflow {
            agents: decode_list("agents", self.agents.as_ref()),
            steps: decode_list::<WorkflowStep>("steps", self.steps.as_ref()),
            id: self.id,
            name: self.name,
            description: self.description,
            status: self.status,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ==================== System prompts ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPromptRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl SystemPromptRecord {
    pub fn from_model(prompt: &SystemPrompt) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: prompt.id.clone(),
            user_id: prompt.user_id.clone(),
            name: prompt.name.clone(),
            description: prompt.description.clone(),
            template: prompt.template.clone(),
            category: prompt.category.clone(),
            tags: encoded(&prompt.tags)?,
            created_at: prompt.created_at,
            updated_at: prompt.updated_at,
        })
    }

    pub fn into_model(self) -> SystemPrompt {
        SystemPrompt {
            tags: decode_list("tags", self.tags.as_ref()),
            id: self.id,
            name: self.name,
            description: self.description,
            template: self.template,
            category: self.category,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ==================== Projects ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub agents: Option<Value>,
    #[serde(default)]
    pub workflows: Option<Value>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn from_model(project: &Project) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: project.id.clone(),
            user_id: project.user_id.clone(),
            name: project.name.clone(),
            description: project.description.clone(),
            project_type: project.project_type,
            status: project.status,
            agents: encoded(&project.agents)?,
            workflows: encoded(&project.workflows)?,
            created_at: project.created_at,
            updated_at: project.updated_at,
        })
    }

    pub fn into_model(self) -> Project {
        Project {
            agents: decode_list("agents", self.agents.as_ref()),
            workflows: decode_list("workflows", self.workflows.as_ref()),
            id: self.id,
            name: self.name,
            description: self.description,
            project_type: self.project_type,
            status: self.status,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ==================== Chat messages ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessageRecord {
    pub fn from_model(message: &ChatMessage) -> Self {
        Self {
            id: message.id.clone(),
            user_id: message.user_id.clone(),
            role: message.role,
            content: message.content.clone(),
            agent_id: message.agent_id.clone(),
            timestamp: message.timestamp,
        }
    }

    pub fn into_model(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            role: self.role,
            content: self.content,
            agent_id: self.agent_id,
            timestamp: self.timestamp,
            user_id: self.user_id,
        }
    }
}

// ==================== Patches ====================

/// Builds a partial storage row from optional fields.
#[derive(Debug, Default)]
pub struct PatchBuilder {
    row: Row,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` when `value` is present.
    pub fn set<T: Serialize>(mut self, key: &str, value: Option<&T>) -> Result<Self, DatabaseError> {
        if let Some(v) = value {
            self.row.insert(key.to_string(), serde_json::to_value(v)?);
        }
        Ok(self)
    }

    /// Set an encoded list field when `items` is present.
    pub fn set_list<T: Serialize>(
        mut self,
        key: &str,
        items: Option<&Vec<T>>,
    ) -> Result<Self, DatabaseError> {
        if let Some(items) = items {
            self.row
                .insert(key.to_string(), Value::String(encode_list(items)?));
        }
        Ok(self)
    }

    /// Stamp `updated_at` and return the row.
    pub fn finish(mut self, updated_at: DateTime<Utc>) -> Row {
        self.row.insert(
            "updated_at".to_string(),
            Value::String(timestamp::format(&updated_at)),
        );
        self.row
    }
}

pub fn agent_patch(update: &AgentUpdate, now: DateTime<Utc>) -> Result<Row, DatabaseError> {
    Ok(PatchBuilder::new()
        .set("name", update.name.as_ref())?
        .set("provider", update.provider.as_ref())?
        .set("model", update.model.as_ref())?
        .set("status", update.status.as_ref())?
        .set("accuracy", update.accuracy.as_ref())?
        .set("speed", update.speed.as_ref())?
        .set("context", update.context.as_ref())?
        .set_list("capabilities", update.capabilities.as_ref())?
        .set("cost", update.cost.as_ref())?
        .set("reliability", update.reliability.as_ref())?
        .finish(now))
}

pub fn workflow_patch(update: &WorkflowUpdate, now: DateTime<Utc>) -> Result<Row, DatabaseError> {
    Ok(PatchBuilder::new()
        .set("name", update.name.as_ref())?
        .set("description", update.description.as_ref())?
        .set_list("steps", update.steps.as_ref())?
        .set_list("agents", update.agents.as_ref())?
        .set("status", update.status.as_ref())?
        .finish(now))
}

pub fn system_prompt_patch(
    update: &SystemPromptUpdate,
    now: DateTime<Utc>,
) -> Result<Row, DatabaseError> {
    Ok(PatchBuilder::new()
        .set("name", update.name.as_ref())?
        .set("description", update.description.as_ref())?
        .set("template", update.template.as_ref())?
        .set("category", update.category.as_ref())?
        .set_list("tags", update.tags.as_ref())?
        .finish(now))
}

pub fn project_patch(update: &ProjectUpdate, now: DateTime<Utc>) -> Result<Row, DatabaseError> {
    Ok(PatchBuilder::new()
        .set("name", update.name.as_ref())?
        .set("description", update.description.as_ref())?
        .set("type", update.project_type.as_ref())?
        .set("status", update.status.as_ref())?
        .set_list("agents", update.agents.as_ref())?
        .set_list("workflows", update.workflows.as_ref())?
        .finish(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_list_round_trip_preserves_order_and_unicode() {
        let cases: Vec<Vec<String>> = vec![
            vec![],
            vec!["Reasoning".into(), "Code Generation".into()],
            vec!["多言語".into(), "émoji 🚀".into(), "".into()],
        ];
        for items in cases {
            let text = encode_list(&items).unwrap();
            let decoded: Vec<String> = decode_list("tags", Some(&Value::String(text)));
            assert_eq!(decoded, items);
        }
    }

    #[test]
    fn test_decode_missing_or_malformed_is_empty() {
        assert!(decode_list::<String>("tags", None).is_empty());
        assert!(decode_list::<String>("tags", Some(&Value::Null)).is_empty());
        assert!(decode_list::<String>("tags", Some(&json!(""))).is_empty());
        assert!(decode_list::<String>("tags", Some(&json!("not json"))).is_empty());
        assert!(decode_list::<String>("tags", Some(&json!(42))).is_empty());
    }

    #[test]
    fn test_decode_accepts_inline_array() {
        let decoded: Vec<String> = decode_list("tags", Some(&json!(["a", "b"])));
        assert_eq!(decoded, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_agent_record_uses_storage_names() {
        let now = Utc::now();
        let agent = Agent {
            id: "agent_1".into(),
            name: "Gemini Pro".into(),
            provider: "Google".into(),
            model: "google/gemini-pro".into(),
            status: AgentStatus::Connected,
            accuracy: 8.5,
            speed: 51.0,
            context: "1M".into(),
            capabilities: vec!["Multimodal".into(), "Long Context".into()],
            cost: Decimal::new(5, 4),
            reliability: 98.8,
            user_id: "u1".into(),
            created_at: now,
            updated_at: now,
        };
        let row = to_row(&AgentRecord::from_model(&agent).unwrap()).unwrap();
        assert_eq!(row["user_id"], "u1");
        assert!(row.contains_key("created_at"));
        assert!(row["capabilities"].is_string());

        let back = from_row::<AgentRecord>(row).unwrap().into_model();
        assert_eq!(back.capabilities, agent.capabilities);
        assert_eq!(back.cost, agent.cost);
    }

    #[test]
    fn test_agent_record_tolerates_null_capabilities() {
        let row = json!({
            "id": "agent_1",
            "user_id": "u1",
            "name": "Llama",
            "capabilities": null,
            "created_at": "2024-05-01T10:00:00.000Z",
            "updated_at": "2024-05-01T10:00:00.000Z"
        });
        let agent = from_row::<AgentRecord>(row.as_object().cloned().unwrap())
            .unwrap()
            .into_model();
        assert!(agent.capabilities.is_empty());
        assert_eq!(agent.status, AgentStatus::Available);
    }

    #[test]
    fn test_patch_only_contains_set_fields() {
        let now = Utc::now();
        let patch = agent_patch(
            &AgentUpdate {
                status: Some(AgentStatus::Error),
                capabilities: Some(vec!["Vision".into()]),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        let mut keys: Vec<_> = patch.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["capabilities", "status", "updated_at"]);
        assert_eq!(patch["status"], "error");
        assert_eq!(patch["capabilities"], r#"["Vision"]"#);
    }

    #[test]
    fn test_timestamp_format_has_millis() {
        let dt = DateTime::parse_from_rfc3339("2024-01-01T00:00:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp::format(&dt), "2024-01-01T00:00:05.000Z");
    }
}
