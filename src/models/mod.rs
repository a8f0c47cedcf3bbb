//! Entity models.
//!
//! These are the in-memory shapes handed to callers. They serialize with
//! camelCase field names; the snake_case storage shapes live in
//! [`crate::data::records`].

/// Implements `Display` and `FromStr` for a fieldless enum from one table of
/// `Variant => "wire_name"` pairs.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Wire name of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(format!(
                        "invalid {} '{}'",
                        stringify!($ty),
                        other
                    )),
                }
            }
        }
    };
}

pub(crate) use string_enum;

mod agent;
mod chat;
mod project;
mod prompt;
mod workflow;

pub use agent::{Agent, AgentStatus, AgentUpdate, NewAgent};
pub use chat::{ChatMessage, NewChatMessage, Role};
pub use project::{NewProject, Project, ProjectStatus, ProjectType, ProjectUpdate};
pub use prompt::{NewSystemPrompt, SystemPrompt, SystemPromptUpdate};
pub use workflow::{
    NewWorkflow, Position, StepType, Workflow, WorkflowStatus, WorkflowStep, WorkflowUpdate,
    referenced_agents,
};

use uuid::Uuid;

/// Generate a record id of the form `<prefix>_<32 hex chars>`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}
