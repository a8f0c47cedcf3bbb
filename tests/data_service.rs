//! Data service integration tests: caching, invalidation scope and stored
//! list fields.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use command_center::db::{RecordStore, Row, Table};
use command_center::models::{
    NewAgent, NewProject, NewSystemPrompt, NewWorkflow, ProjectStatus, ProjectType, StepType,
    SystemPromptUpdate, WorkflowStep, WorkflowUpdate,
};
use command_center::testing::TestHarnessBuilder;

fn row(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        description: "test".to_string(),
        project_type: ProjectType::Api,
        status: ProjectStatus::Planning,
        agents: vec![],
        workflows: vec![],
    }
}

#[tokio::test(start_paused = true)]
async fn cached_list_expires_after_ttl() {
    let harness = TestHarnessBuilder::new()
        .with_cache_ttl(Duration::from_secs(300))
        .build();

    harness.data.list_agents("u1").await.unwrap();
    let after_first = harness.store.operations();

    tokio::time::advance(Duration::from_secs(299)).await;
    harness.data.list_agents("u1").await.unwrap();
    assert_eq!(harness.store.operations(), after_first, "should be a cache hit");

    tokio::time::advance(Duration::from_secs(2)).await;
    harness.data.list_agents("u1").await.unwrap();
    assert_eq!(harness.store.operations(), after_first + 1, "should refetch");
}

#[tokio::test]
async fn writes_invalidate_only_their_kind_and_user() {
    let harness = TestHarnessBuilder::new().build();
    let data = &harness.data;

    for user in ["u1", "u2"] {
        data.list_agents(user).await.unwrap();
        data.list_projects(user).await.unwrap();
    }
    assert_eq!(harness.cache.len().await, 4);

    data.create_agent("u1", NewAgent::new("Claude", "Anthropic", "anthropic/claude-3.5-sonnet"))
        .await
        .unwrap();
    assert_eq!(harness.cache.len().await, 3);

    let before = harness.store.operations();
    data.list_projects("u1").await.unwrap();
    data.list_agents("u2").await.unwrap();
    data.list_projects("u2").await.unwrap();
    assert_eq!(harness.store.operations(), before, "unrelated entries must stay cached");

    assert_eq!(data.list_agents("u1").await.unwrap().len(), 1);
    assert_eq!(harness.store.operations(), before + 1);
}

#[tokio::test]
async fn chat_history_cache_is_invalidated_for_every_limit() {
    let harness = TestHarnessBuilder::new().build();
    let data = &harness.data;

    data.list_chat_messages("u1", 10).await.unwrap();
    data.list_chat_messages("u1", 50).await.unwrap();
    assert_eq!(harness.cache.len().await, 2);

    data.create_chat_message("u1", command_center::models::NewChatMessage::user("hi"))
        .await
        .unwrap();
    assert!(harness.cache.is_empty().await);
    assert_eq!(data.list_chat_messages("u1", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_fields_round_trip_through_storage() {
    let harness = TestHarnessBuilder::new().build();
    let data = &harness.data;

    let prompt = data
        .create_system_prompt(
            "u1",
            NewSystemPrompt {
                name: "Traducción".to_string(),
                description: String::new(),
                template: "Translate {text} to {language}".to_string(),
                category: "language".to_string(),
                tags: vec!["idiomas".to_string(), "日本語".to_string(), "emoji 🚀".to_string()],
            },
        )
        .await
        .unwrap();

    // Stored as JSON text, not as an array.
    let stored = harness.store.rows(Table::SystemPrompts).await;
    assert!(stored[0]["tags"].is_string());

    let listed = data.list_system_prompts("u1").await.unwrap();
    assert_eq!(listed, vec![prompt.clone()]);

    data.update_system_prompt(
        "u1",
        &prompt.id,
        &SystemPromptUpdate {
            tags: Some(vec![]),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let listed = data.list_system_prompts("u1").await.unwrap();
    assert!(listed[0].tags.is_empty());
    assert_eq!(listed[0].name, "Traducción");
}

#[tokio::test]
async fn workflow_steps_survive_storage() {
    let harness = TestHarnessBuilder::new().build();
    let steps = vec![
        WorkflowStep::new("s1", StepType::Prompt).with_prompt("Outline {topic}"),
        WorkflowStep::new("s2", StepType::AgentCall).with_agent("agent_1"),
    ];
    let workflow = harness
        .data
        .create_workflow("u1", NewWorkflow::from_steps("Research", steps))
        .await
        .unwrap();

    let listed = harness.data.list_workflows("u1").await.unwrap();
    assert_eq!(listed, vec![workflow]);
    assert_eq!(listed[0].agents, vec!["agent_1".to_string()]);
}

#[tokio::test]
async fn workflow_agents_follow_steps_unless_given() {
    let harness = TestHarnessBuilder::new().build();
    let workflow = harness
        .data
        .create_workflow(
            "u1",
            NewWorkflow {
                name: "Triage".to_string(),
                description: String::new(),
                steps: vec![
                    WorkflowStep::new("s1", StepType::AgentCall).with_agent("agent_b"),
                    WorkflowStep::new("s2", StepType::AgentCall).with_agent("agent_b"),
                    WorkflowStep::new("s3", StepType::AgentCall).with_agent("agent_a"),
                ],
                agents: vec![],
                status: Default::default(),
            },
        )
        .await
        .unwrap();
    assert_eq!(workflow.agents, vec!["agent_b".to_string(), "agent_a".to_string()]);

    harness
        .data
        .update_workflow(
            "u1",
            &workflow.id,
            &WorkflowUpdate {
                steps: Some(vec![
                    WorkflowStep::new("s1", StepType::Prompt),
                    WorkflowStep::new("s2", StepType::AgentCall).with_agent("agent_c"),
                ]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let listed = harness.data.list_workflows("u1").await.unwrap();
    assert_eq!(listed[0].agents, vec!["agent_c".to_string()]);

    harness
        .data
        .update_workflow(
            "u1",
            &workflow.id,
            &WorkflowUpdate {
                steps: Some(vec![]),
                agents: Some(vec!["agent_manual".to_string()]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let listed = harness.data.list_workflows("u1").await.unwrap();
    assert_eq!(listed[0].agents, vec!["agent_manual".to_string()]);
}

#[tokio::test]
async fn malformed_or_missing_list_fields_decode_as_empty() {
    let harness = TestHarnessBuilder::new().build();
    let ts = "2024-05-01T12:00:00.000Z";
    for (id, capabilities) in [
        ("a_text", json!("not json [")),
        ("a_null", serde_json::Value::Null),
        ("a_object", json!("{\"k\": 1}")),
    ] {
        harness
            .store
            .insert(
                Table::Agents,
                row(json!({
                    "id": id,
                    "user_id": "u1",
                    "name": id,
                    "capabilities": capabilities,
                    "created_at": ts,
                    "updated_at": ts,
                })),
            )
            .await
            .unwrap();
    }
    harness
        .store
        .insert(
            Table::Agents,
            row(json!({
                "id": "a_missing",
                "user_id": "u1",
                "name": "a_missing",
                "created_at": ts,
                "updated_at": ts,
            })),
        )
        .await
        .unwrap();

    let agents = harness.data.list_agents("u1").await.unwrap();
    assert_eq!(agents.len(), 4);
    assert!(agents.iter().all(|a| a.capabilities.is_empty()));
}

#[tokio::test]
async fn undecodable_rows_are_skipped() {
    let harness = TestHarnessBuilder::new().build();
    harness
        .store
        .insert(
            Table::Projects,
            row(json!({"id": "broken", "user_id": "u1", "name": "no timestamps"})),
        )
        .await
        .unwrap();
    harness.data.create_project("u1", project("Valid")).await.unwrap();

    let projects = harness.data.list_projects("u1").await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "Valid");
}

#[tokio::test]
async fn other_users_cannot_update_or_delete() {
    let harness = TestHarnessBuilder::new().build();
    let created = harness.data.create_project("u1", project("Mine")).await.unwrap();

    assert!(!harness.data.delete_project("u2", &created.id).await.unwrap());
    assert!(
        harness
            .data
            .update_project(
                "u2",
                &created.id,
                &command_center::models::ProjectUpdate {
                    name: Some("Stolen".to_string()),
                    ..Default::default()
                },
            )
            .await
            .is_err()
    );
    assert_eq!(harness.data.list_projects("u1").await.unwrap()[0].name, "Mine");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn list_racing_a_write_never_caches_stale_rows() {
    let harness = TestHarnessBuilder::new().build();
    let ts = "2024-05-01T12:00:00.000Z";
    for i in 0..300 {
        harness
            .store
            .insert(
                Table::Agents,
                row(json!({
                    "id": format!("seed_{i}"),
                    "user_id": "u1",
                    "name": format!("seed {i}"),
                    "capabilities": "[\"Reasoning\"]",
                    "created_at": ts,
                    "updated_at": ts,
                })),
            )
            .await
            .unwrap();
    }

    for round in 0..200 {
        let reader = {
            let data = harness.data.clone();
            tokio::spawn(async move { data.list_agents("u1").await })
        };
        let writer = {
            let data = harness.data.clone();
            tokio::spawn(async move {
                data.create_agent("u1", NewAgent::new("late", "Local", "local/late"))
                    .await
            })
        };
        reader.await.unwrap().unwrap();
        writer.await.unwrap().unwrap();

        let listed = harness.data.list_agents("u1").await.unwrap().len();
        let stored = harness.store.rows(Table::Agents).await.len();
        assert_eq!(listed, stored, "stale cached list after round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chat_history_racing_a_write_is_not_left_stale() {
    let harness = TestHarnessBuilder::new().build();

    for round in 0..100 {
        let reader = {
            let data = harness.data.clone();
            tokio::spawn(async move { data.list_chat_messages("u1", 500).await })
        };
        let writer = {
            let data = harness.data.clone();
            tokio::spawn(async move {
                data.create_chat_message(
                    "u1",
                    command_center::models::NewChatMessage::user(format!("m{round}")),
                )
                .await
            })
        };
        reader.await.unwrap().unwrap();
        writer.await.unwrap().unwrap();

        let history = harness.data.list_chat_messages("u1", 500).await.unwrap();
        assert_eq!(history.len(), round + 1);
    }
}

#[cfg(feature = "libsql")]
mod libsql {
    use std::sync::Arc;

    use super::*;
    use pretty_assertions::assert_eq;
    use command_center::config::{GateConfig, SeedConfig};
    use command_center::data::{DataService, RequestGate, ResultCache};
    use command_center::db::LibSqlStore;

    async fn service(path: &std::path::Path) -> DataService {
        let store = LibSqlStore::new_local(path).await.unwrap();
        store.run_migrations().await.unwrap();
        DataService::new(
            Arc::new(store),
            Arc::new(RequestGate::new(GateConfig::unthrottled())),
            Arc::new(ResultCache::default()),
            SeedConfig {
                delay: Duration::ZERO,
            },
        )
    }

    #[tokio::test]
    async fn records_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("command_center.db");

        let created = {
            let data = service(&path).await;
            data.create_agent(
                "u1",
                NewAgent::new("Gemini Pro", "Google", "google/gemini-pro")
                    .with_capabilities(["Multimodal", "Búsqueda"]),
            )
            .await
            .unwrap()
        };

        let data = service(&path).await;
        let agents = data.list_agents("u1").await.unwrap();
        assert_eq!(agents, vec![created]);
        assert!(data.list_agents("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_history_is_ordered_and_limited() {
        let dir = tempfile::tempdir().unwrap();
        let data = service(&dir.path().join("chat.db")).await;
        let base = chrono::Utc::now();
        for i in 0..5 {
            let mut msg = command_center::models::NewChatMessage::user(format!("m{i}"));
            msg.timestamp = base + chrono::Duration::seconds(i);
            data.create_chat_message("u1", msg).await.unwrap();
        }

        let history = data.list_chat_messages("u1", 3).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }
}
