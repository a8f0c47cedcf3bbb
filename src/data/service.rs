//! Rate-limited, cached data access.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::SeedConfig;
use crate::data::cache::{CacheKey, EntityKind, ResultCache};
use crate::data::gate::RequestGate;
use crate::data::records::{
    self, AgentRecord, ChatMessageRecord, ProjectRecord, SystemPromptRecord, WorkflowRecord,
};
use crate::data::seed::{self, SeedOutcome};
use crate::db::{ListQuery, RecordStore, Row, Table};
use crate::error::DatabaseError;
use crate::models::{
    Agent, AgentUpdate, ChatMessage, NewAgent, NewChatMessage, NewProject, NewSystemPrompt,
    NewWorkflow, Project, ProjectUpdate, SystemPrompt, SystemPromptUpdate, Workflow,
    WorkflowUpdate, new_id, referenced_agents,
};

/// Default number of chat messages loaded into a transcript.
pub const DEFAULT_CHAT_LIMIT: usize = 50;

#[derive(Serialize)]
struct ChatListParams {
    limit: usize,
}

/// Entity CRUD over a [`RecordStore`].
///
/// Every backend call goes through the shared [`RequestGate`]. List results
/// are cached per `(kind, user)`; each write evicts exactly the cache entries
/// of the kind it touched for the user who owns the record.
pub struct DataService {
    store: Arc<dyn RecordStore>,
    gate: Arc<RequestGate>,
    cache: Arc<ResultCache>,
    seed: SeedConfig,
}

impl DataService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gate: Arc<RequestGate>,
        cache: Arc<ResultCache>,
        seed: SeedConfig,
    ) -> Self {
        Self {
            store,
            gate,
            cache,
            seed,
        }
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    // ==================== Agents ====================

    pub async fn create_agent(&self, user_id: &str, new: NewAgent) -> Result<Agent, DatabaseError> {
        let now = Utc::now();
        let agent = Agent {
            id: new_id("agent"),
            name: new.name,
            provider: new.provider,
            model: new.model,
            status: new.status,
            accuracy: new.accuracy,
            speed: new.speed,
            context: new.context,
            capabilities: new.capabilities,
            cost: new.cost,
            reliability: new.reliability,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        let row = records::to_row(&AgentRecord::from_model(&agent)?)?;
        self.insert(Table::Agents, EntityKind::Agents, user_id, row)
            .await?;
        tracing::debug!("Created agent {} ({})", agent.id, agent.name);
        Ok(agent)
    }

    pub async fn list_agents(&self, user_id: &str) -> Result<Vec<Agent>, DatabaseError> {
        self.cached_list(
            CacheKey::new(EntityKind::Agents, user_id),
            Table::Agents,
            ListQuery::newest_first(user_id),
            AgentRecord::into_model,
        )
        .await
    }

    pub async fn update_agent(
        &self,
        user_id: &str,
        id: &str,
        update: &AgentUpdate,
    ) -> Result<(), DatabaseError> {
        let patch = records::agent_patch(update, Utc::now())?;
        self.update(Table::Agents, EntityKind::Agents, user_id, id, patch)
            .await
    }

    pub async fn delete_agent(&self, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
        self.delete(Table::Agents, EntityKind::Agents, user_id, id)
            .await
    }

    // ==================== Workflows ====================

    pub async fn create_workflow(
        &self,
        user_id: &str,
        new: NewWorkflow,
    ) -> Result<Workflow, DatabaseError> {
        let now = Utc::now();
        let mut workflow = Workflow {
            id: new_id("workflow"),
            name: new.name,
            description: new.description,
            steps: new.steps,
            agents: new.agents,
            status: new.status,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        if workflow.agents.is_empty() {
            workflow.sync_agents();
        }
        let row = records::to_row(&WorkflowRecord::from_model(&workflow)?)?;
        self.insert(Table::Workflows, EntityKind::Workflows, user_id, row)
            .await?;
        Ok(workflow)
    }

    pub async fn list_workflows(&self, user_id: &str) -> Result<Vec<Workflow>, DatabaseError> {
        self.cached_list(
            CacheKey::new(EntityKind::Workflows, user_id),
            Table::Workflows,
            ListQuery::newest_first(user_id),
            WorkflowRecord::into_model,
        )
        .await
    }

    pub async fn update_workflow(
        &self,
        user_id: &str,
        id: &str,
        update: &WorkflowUpdate,
    ) -> Result<(), DatabaseError> {
        // New steps without an explicit agent list re-derive it.
        let derived;
        let update = match (&update.steps, &update.agents) {
            (Some(steps), None) => {
                derived = WorkflowUpdate {
                    agents: Some(referenced_agents(steps)),
                    ..update.clone()
                };
                &derived
            }
            _ => update,
        };
        let patch = records::workflow_patch(update, Utc::now())?;
        self.update(Table::Workflows, EntityKind::Workflows, user_id, id, patch)
            .await
    }

    pub async fn delete_workflow(&self, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
        self.delete(Table::Workflows, EntityKind::Workflows, user_id, id)
            .await
    }

    // ==================== System prompts ====================

    pub async fn create_system_prompt(
        &self,
        user_id: &str,
        new: NewSystemPrompt,
    ) -> Result<SystemPrompt, DatabaseError> {
        let now = Utc::now();
        let prompt = SystemPrompt {
            id: new_id("prompt"),
            name: new.name,
            description: new.description,
            template: new.template,
            category: new.category,
            tags: new.tags,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        let row = records::to_row(&SystemPromptRecord::from_model(&prompt)?)?;
        self.insert(Table::SystemPrompts, EntityKind::SystemPrompts, user_id, row)
            .await?;
        Ok(prompt)
    }

    pub async fn list_system_prompts(
        &self,
        user_id: &str,
    ) -> Result<Vec<SystemPrompt>, DatabaseError> {
        self.cached_list(
            CacheKey::new(EntityKind::SystemPrompts, user_id),
            Table::SystemPrompts,
            ListQuery::newest_first(user_id),
            SystemPromptRecord::into_model,
        )
        .await
    }

    pub async fn update_system_prompt(
        &self,
        user_id: &str,
        id: &str,
        update: &SystemPromptUpdate,
    ) -> Result<(), DatabaseError> {
        let patch = records::system_prompt_patch(update, Utc::now())?;
        self.update(
            Table::SystemPrompts,
            EntityKind::SystemPrompts,
            user_id,
            id,
            patch,
        )
        .await
    }

    pub async fn delete_system_prompt(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<bool, DatabaseError> {
        self.delete(Table::SystemPrompts, EntityKind::SystemPrompts, user_id, id)
            .await
    }

    // ==================== Projects ====================

    pub async fn create_project(
        &self,
        user_id: &str,
        new: NewProject,
    ) -> Result<Project, DatabaseError> {
        let now = Utc::now();
        let project = Project {
            id: new_id("project"),
            name: new.name,
            description: new.description,
            project_type: new.project_type,
            status: new.status,
            agents: new.agents,
            workflows: new.workflows,
            user_id: user_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        let row = records::to_row(&ProjectRecord::from_model(&project)?)?;
        self.insert(Table::Projects, EntityKind::Projects, user_id, row)
            .await?;
        Ok(project)
    }

    pub async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>, DatabaseError> {
        self.cached_list(
            CacheKey::new(EntityKind::Projects, user_id),
            Table::Projects,
            ListQuery::newest_first(user_id),
            ProjectRecord::into_model,
        )
        .await
    }

    pub async fn update_project(
        &self,
        user_id: &str,
        id: &str,
        update: &ProjectUpdate,
    ) -> Result<(), DatabaseError> {
        let patch = records::project_patch(update, Utc::now())?;
        self.update(Table::Projects, EntityKind::Projects, user_id, id, patch)
            .await
    }

    pub async fn delete_project(&self, user_id: &str, id: &str) -> Result<bool, DatabaseError> {
        self.delete(Table::Projects, EntityKind::Projects, user_id, id)
            .await
    }

    // ==================== Chat messages ====================

    pub async fn create_chat_message(
        &self,
        user_id: &str,
        new: NewChatMessage,
    ) -> Result<ChatMessage, DatabaseError> {
        let message = ChatMessage {
            id: new_id("msg"),
            role: new.role,
            content: new.content,
            agent_id: new.agent_id,
            timestamp: new.timestamp,
            user_id: user_id.to_string(),
        };
        let row = records::to_row(&ChatMessageRecord::from_model(&message))?;
        self.insert(Table::ChatMessages, EntityKind::ChatMessages, user_id, row)
            .await?;
        Ok(message)
    }

    /// The most recent `limit` messages, oldest first.
    pub async fn list_chat_messages(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, DatabaseError> {
        let key = CacheKey::with_params(EntityKind::ChatMessages, user_id, &ChatListParams { limit });
        if let Some(hit) = self.cache.get::<Vec<ChatMessage>>(&key).await {
            tracing::debug!("Cache hit: {}", key);
            return Ok(hit);
        }

        let seen = self
            .cache
            .generation(EntityKind::ChatMessages, user_id)
            .await;
        let query = ListQuery::newest_first(user_id)
            .order_by("timestamp", true)
            .limit(limit);
        let mut messages = self
            .fetch(Table::ChatMessages, &query, ChatMessageRecord::into_model)
            .await?;
        messages.reverse();

        self.cache.set_if_current(key, messages.clone(), seen).await;
        Ok(messages)
    }

    pub async fn delete_chat_message(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<bool, DatabaseError> {
        self.delete(Table::ChatMessages, EntityKind::ChatMessages, user_id, id)
            .await
    }

    // ==================== Seeding ====================

    /// Create the default agents and prompts for a user who has none.
    ///
    /// A rate-limit failure part way through is logged and reported as
    /// [`SeedOutcome::Deferred`]; the marker is not set, so the next start
    /// tries again.
    pub async fn initialize_default_data(
        &self,
        user_id: &str,
    ) -> Result<SeedOutcome, DatabaseError> {
        let marker = CacheKey::new(EntityKind::Initialized, user_id);
        if self.cache.get::<bool>(&marker).await.is_some() {
            return Ok(SeedOutcome::AlreadyInitialized);
        }

        match self.seed_defaults(user_id).await {
            Ok(outcome) => {
                self.cache.set(marker, true).await;
                Ok(outcome)
            }
            Err(e) if e.is_rate_limited() => {
                tracing::warn!(
                    "Rate limited while seeding default data for {}; will retry on next start",
                    user_id
                );
                Ok(SeedOutcome::Deferred)
            }
            Err(e) => Err(e),
        }
    }

    async fn seed_defaults(&self, user_id: &str) -> Result<SeedOutcome, DatabaseError> {
        if !self.list_agents(user_id).await?.is_empty() {
            return Ok(SeedOutcome::ExistingData);
        }

        tracing::info!("Initializing default data for user {}", user_id);

        let agents = seed::default_agents();
        let agent_count = agents.len();
        for agent in agents {
            self.create_agent(user_id, agent).await?;
            tokio::time::sleep(self.seed.delay).await;
        }

        let prompts = seed::default_prompts();
        let prompt_count = prompts.len();
        for prompt in prompts {
            self.create_system_prompt(user_id, prompt).await?;
            tokio::time::sleep(self.seed.delay).await;
        }

        tracing::info!("Default data initialized for user {}", user_id);
        Ok(SeedOutcome::Seeded {
            agents: agent_count,
            prompts: prompt_count,
        })
    }

    // ==================== Helpers ====================

    async fn insert(
        &self,
        table: Table,
        kind: EntityKind,
        user_id: &str,
        row: Row,
    ) -> Result<(), DatabaseError> {
        self.gate
            .execute(|| self.store.insert(table, row.clone()))
            .await?;
        self.cache.invalidate(kind, user_id).await;
        Ok(())
    }

    async fn update(
        &self,
        table: Table,
        kind: EntityKind,
        user_id: &str,
        id: &str,
        patch: Row,
    ) -> Result<(), DatabaseError> {
        self.gate
            .execute(|| self.store.update(table, id, user_id, patch.clone()))
            .await?;
        self.cache.invalidate(kind, user_id).await;
        Ok(())
    }

    async fn delete(
        &self,
        table: Table,
        kind: EntityKind,
        user_id: &str,
        id: &str,
    ) -> Result<bool, DatabaseError> {
        let removed = self
            .gate
            .execute(|| self.store.delete(table, id, user_id))
            .await?;
        self.cache.invalidate(kind, user_id).await;
        Ok(removed)
    }

    async fn cached_list<R, M>(
        &self,
        key: CacheKey,
        table: Table,
        query: ListQuery,
        into_model: fn(R) -> M,
    ) -> Result<Vec<M>, DatabaseError>
    where
        R: DeserializeOwned,
        M: Clone + Send + Sync + 'static,
    {
        if let Some(hit) = self.cache.get::<Vec<M>>(&key).await {
            tracing::debug!("Cache hit: {}", key);
            return Ok(hit);
        }

        // A write that lands between the fetch and the store must win.
        let seen = self.cache.generation(key.kind, &key.user_id).await;
        let items = self.fetch(table, &query, into_model).await?;
        self.cache.set_if_current(key, items.clone(), seen).await;
        Ok(items)
    }

    /// Run a gated list and decode the rows. Rows that cannot be decoded are
    /// skipped with a warning.
    async fn fetch<R, M>(
        &self,
        table: Table,
        query: &ListQuery,
        into_model: fn(R) -> M,
    ) -> Result<Vec<M>, DatabaseError>
    where
        R: DeserializeOwned,
    {
        let rows = self.gate.execute(|| self.store.list(table, query)).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match records::from_row::<R>(row) {
                Ok(record) => items.push(into_model(record)),
                Err(e) => tracing::warn!("Skipping undecodable {} row: {}", table, e),
            }
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::db::InMemoryStore;
    use crate::models::{AgentStatus, ProjectType, Role};
    use pretty_assertions::assert_eq;

    fn service() -> (Arc<InMemoryStore>, DataService) {
        let store = Arc::new(InMemoryStore::new());
        let service = DataService::new(
            store.clone(),
            Arc::new(RequestGate::new(GateConfig::unthrottled())),
            Arc::new(ResultCache::default()),
            SeedConfig {
                delay: std::time::Duration::ZERO,
            },
        );
        (store, service)
    }

    #[tokio::test]
    async fn test_agent_crud() {
        let (_, svc) = service();
        let created = svc
            .create_agent(
                "u1",
                NewAgent::new("Claude", "Anthropic", "anthropic/claude-3.5-sonnet")
                    .with_capabilities(["Reasoning", "Code Generation"]),
            )
            .await
            .unwrap();
        assert!(created.id.starts_with("agent_"));

        let listed = svc.list_agents("u1").await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        svc.update_agent("u1", &created.id, &AgentUpdate::status(AgentStatus::Error))
            .await
            .unwrap();
        let listed = svc.list_agents("u1").await.unwrap();
        assert_eq!(listed[0].status, AgentStatus::Error);
        assert_eq!(listed[0].capabilities, created.capabilities);
        assert!(listed[0].updated_at >= created.updated_at);

        assert!(svc.delete_agent("u1", &created.id).await.unwrap());
        assert!(svc.list_agents("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_served_from_cache() {
        let (store, svc) = service();
        svc.list_projects("u1").await.unwrap();
        let ops = store.operations();
        svc.list_projects("u1").await.unwrap();
        assert_eq!(store.operations(), ops);
    }

    #[tokio::test]
    async fn test_create_project_invalidates_list() {
        let (_, svc) = service();
        assert!(svc.list_projects("u1").await.unwrap().is_empty());
        svc.create_project(
            "u1",
            NewProject {
                name: "Support bot".into(),
                description: String::new(),
                project_type: ProjectType::Chatbot,
                status: Default::default(),
                agents: vec![],
                workflows: vec![],
            },
        )
        .await
        .unwrap();
        assert_eq!(svc.list_projects("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_messages_come_back_chronologically() {
        let (_, svc) = service();
        let base = Utc::now();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            let mut msg = NewChatMessage::user(*text);
            msg.timestamp = base + chrono::Duration::seconds(i as i64);
            svc.create_chat_message("u1", msg).await.unwrap();
        }

        let last_two = svc.list_chat_messages("u1", 2).await.unwrap();
        let contents: Vec<_> = last_two.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);
        assert!(last_two.iter().all(|m| m.role == Role::User));
    }

    #[tokio::test]
    async fn test_seeding_runs_once() {
        let (_, svc) = service();
        assert_eq!(
            svc.initialize_default_data("u1").await.unwrap(),
            SeedOutcome::Seeded {
                agents: 4,
                prompts: 3
            }
        );
        assert_eq!(
            svc.initialize_default_data("u1").await.unwrap(),
            SeedOutcome::AlreadyInitialized
        );
        assert_eq!(svc.list_agents("u1").await.unwrap().len(), 4);
        assert_eq!(svc.list_system_prompts("u1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_seeding_skips_users_with_agents() {
        let (_, svc) = service();
        svc.create_agent("u1", NewAgent::new("Mine", "Local", "local/model"))
            .await
            .unwrap();
        assert_eq!(
            svc.initialize_default_data("u1").await.unwrap(),
            SeedOutcome::ExistingData
        );
    }

    #[tokio::test]
    async fn test_seeding_defers_on_repeated_rate_limit() {
        let (store, svc) = service();
        store.fail_next(DatabaseError::RateLimited { reset: None });
        store.fail_next(DatabaseError::RateLimited { reset: None });
        assert_eq!(
            svc.initialize_default_data("u1").await.unwrap(),
            SeedOutcome::Deferred
        );
        // Marker not set, so a later attempt seeds.
        assert!(matches!(
            svc.initialize_default_data("u1").await.unwrap(),
            SeedOutcome::Seeded { .. }
        ));
    }
}
