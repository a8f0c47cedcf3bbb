//! Chat orchestration.
//!
//! One exchange is: record the user's turn, ask the selected agent, record the
//! reply. Model failures never surface as errors here; the user sees a fixed
//! apology and the detail goes to the log.

use std::sync::Arc;

use crate::data::{DEFAULT_CHAT_LIMIT, DataService};
use crate::error::ChatError;
use crate::llm::AgentRouter;
use crate::models::{ChatMessage, NewChatMessage};

/// Assistant reply used when the agent call fails.
pub const FALLBACK_REPLY: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Assistant reply used when the agent answers with nothing.
pub const EMPTY_REPLY: &str = "No response received";

/// The visible conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Clear the visible transcript. Stored history is untouched.
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

pub struct ChatService {
    data: Arc<DataService>,
    router: Arc<AgentRouter>,
}

impl ChatService {
    pub fn new(data: Arc<DataService>, router: Arc<AgentRouter>) -> Self {
        Self { data, router }
    }

    /// Run one exchange with `agent` and return the assistant message.
    ///
    /// Both turns are appended to `transcript` and persisted, user first.
    pub async fn send(
        &self,
        transcript: &mut Transcript,
        user_id: &str,
        agent: &str,
        text: &str,
    ) -> Result<ChatMessage, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let user_turn = self
            .data
            .create_chat_message(user_id, NewChatMessage::user(text))
            .await?;
        transcript.push(user_turn);

        let response = self.router.call_agent(agent, text).await;
        let reply = match response.error {
            Some(error) => {
                tracing::warn!("Chat reply from {} failed: {}", agent, error);
                FALLBACK_REPLY.to_string()
            }
            None if response.content.is_empty() => EMPTY_REPLY.to_string(),
            None => response.content,
        };

        let assistant_turn = self
            .data
            .create_chat_message(user_id, NewChatMessage::assistant(agent, reply))
            .await?;
        transcript.push(assistant_turn.clone());
        Ok(assistant_turn)
    }

    /// Build a transcript from the most recent stored messages, oldest first.
    pub async fn load_history(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Transcript, ChatError> {
        let messages = self
            .data
            .list_chat_messages(user_id, limit.unwrap_or(DEFAULT_CHAT_LIMIT))
            .await?;
        Ok(Transcript::from_messages(messages))
    }
}
