use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::string_enum;

/// Connection status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Connected,
    #[default]
    Available,
    Error,
}

string_enum!(AgentStatus {
    Connected => "connected",
    Available => "available",
    Error => "error",
});

/// A configured reference to a third-party model plus display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub provider: String,
    /// Underlying model identifier, e.g. `anthropic/claude-3.5-sonnet`.
    pub model: String,
    pub status: AgentStatus,
    pub accuracy: f64,
    pub speed: f64,
    /// Context window label, e.g. `128K`.
    pub context: String,
    pub capabilities: Vec<String>,
    pub cost: Decimal,
    pub reliability: f64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    pub name: String,
    pub provider: String,
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
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub reliability: f64,
}

impl NewAgent {
    /// Start a new agent definition with empty metrics.
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
            status: AgentStatus::default(),
            accuracy: 0.0,
            speed: 0.0,
            context: String::new(),
            capabilities: Vec::new(),
            cost: Decimal::ZERO,
            reliability: 0.0,
        }
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metrics(mut self, accuracy: f64, speed: f64, reliability: f64) -> Self {
        self.accuracy = accuracy;
        self.speed = speed;
        self.reliability = reliability;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost = cost;
        self
    }
}

/// Partial update of an agent. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub status: Option<AgentStatus>,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub context: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub cost: Option<Decimal>,
    pub reliability: Option<f64>,
}

impl AgentUpdate {
    /// Status-only update.
    pub fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Metric-only update.
    pub fn metrics(accuracy: f64, speed: f64, reliability: f64) -> Self {
        Self {
            accuracy: Some(accuracy),
            speed: Some(speed),
            reliability: Some(reliability),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            AgentStatus::Connected,
            AgentStatus::Available,
            AgentStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<AgentStatus>().unwrap(), status);
        }
        assert!("offline".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn test_agent_serializes_camel_case() {
        let now = Utc::now();
        let agent = Agent {
            id: "agent_1".to_string(),
            name: "Claude".to_string(),
            provider: "Anthropic".to_string(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            status: AgentStatus::Connected,
            accuracy: 9.5,
            speed: 42.0,
            context: "200K".to_string(),
            capabilities: vec!["Reasoning".to_string()],
            cost: Decimal::new(15, 3),
            reliability: 99.5,
            user_id: "u1".to_string(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["status"], "connected");
        assert!(json.get("user_id").is_none());
    }
}
