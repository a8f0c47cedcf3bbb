//! Subcommand implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::chat::{ChatService, Transcript};
use crate::cli::Command;
use crate::config::Config;
use crate::data::{DataService, RequestGate, ResultCache, SeedOutcome};
use crate::db;
use crate::llm::{AgentRouter, OpenRouterProvider};
use crate::pipeline::{
    DEFAULT_STAGES, PipelineObserver, PipelineRequest, PipelineRun, PipelineSimulator,
    ScriptedExecutor, format_duration,
};
use crate::prompts::{self, PromptTester, tester::COMPARISON_MODELS};

/// Services wired from configuration.
struct Services {
    data: Arc<DataService>,
    router: Arc<AgentRouter>,
}

impl Services {
    async fn connect(config: &Config) -> anyhow::Result<Self> {
        let store = db::connect_from_config(&config.database)
            .await
            .context("failed to open record store")?;
        let gate = Arc::new(RequestGate::new(config.gate.clone()));
        let cache = Arc::new(ResultCache::new(&config.cache));
        let data = Arc::new(DataService::new(store, gate, cache, config.seed.clone()));

        let provider = Arc::new(OpenRouterProvider::new(config.llm.clone())?);
        let router = Arc::new(AgentRouter::new(provider, &config.llm));

        Ok(Self { data, router })
    }
}

/// Run a parsed subcommand.
pub async fn run_command(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Seed { user } => {
            let services = Services::connect(&config).await?;
            match services.data.initialize_default_data(&user).await? {
                SeedOutcome::Seeded { agents, prompts } => {
                    println!("Seeded {agents} agents and {prompts} prompts for {user}")
                }
                SeedOutcome::ExistingData | SeedOutcome::AlreadyInitialized => {
                    println!("{user} already has data; nothing to do")
                }
                SeedOutcome::Deferred => {
                    println!("Backend is rate limiting; seeding deferred to the next run")
                }
            }
        }

        Command::Agents { user } => {
            let services = Services::connect(&config).await?;
            let agents = services.data.list_agents(&user).await?;
            if agents.is_empty() {
                println!("No agents for {user}. Run `command-center seed` first.");
            }
            for agent in agents {
                println!(
                    "{:<20} {:<12} {:<32} {:<10} ctx {:<5} acc {:>4.1} rel {:>5.1}% ${}",
                    agent.name,
                    agent.provider,
                    agent.model,
                    agent.status,
                    agent.context,
                    agent.accuracy,
                    agent.reliability,
                    agent.cost,
                );
            }
        }

        Command::Chat {
            user,
            agent,
            history,
            message,
        } => {
            let services = Services::connect(&config).await?;
            let chat = ChatService::new(services.data.clone(), services.router.clone());

            let mut transcript = if history {
                let transcript = chat.load_history(&user, None).await?;
                for msg in transcript.messages() {
                    println!("[{}] {}", msg.role, msg.content);
                }
                transcript
            } else {
                Transcript::new()
            };

            let reply = chat.send(&mut transcript, &user, &agent, &message).await?;
            println!("{}", reply.content);
        }

        Command::Deploy { fail_at, branch } => {
            let simulator = match fail_at {
                Some(stage) => {
                    let index = stage_index(&stage)?;
                    PipelineSimulator::new(
                        Arc::new(ScriptedExecutor::fail_at(index, Duration::from_secs(1))),
                        &config.pipeline,
                    )
                }
                None => PipelineSimulator::simulated(&config.pipeline),
            }
            .with_observer(Arc::new(ProgressPrinter));

            let run = simulator
                .run(PipelineRequest {
                    branch,
                    ..PipelineRequest::default()
                })
                .await?;
            print_summary(&run);
        }

        Command::Render { template, vars } => {
            println!(
                "{}",
                prompts::render(&template, vars.iter().map(|(k, v)| (k, v)))
            );
            let provided: Vec<&str> = vars.iter().map(|(k, _)| k.as_str()).collect();
            let missing: Vec<String> = prompts::extract_variables(&template)
                .into_iter()
                .filter(|v| !provided.contains(&v.as_str()))
                .collect();
            if !missing.is_empty() {
                eprintln!("Unfilled variables: {}", missing.join(", "));
            }
        }

        Command::Bench {
            template,
            vars,
            model,
            batch,
        } => {
            let services = Services::connect(&config).await?;
            let tester = PromptTester::new(services.router.clone());
            let results = match model {
                Some(model) => tester.run(&model, &template, vars, batch.max(1)).await,
                None => tester.run_across(COMPARISON_MODELS, &template, vars).await,
            };

            for result in &results {
                println!(
                    "{:<20} {:>6}ms {:>6} tokens ${:<10} {}",
                    result.model,
                    result.metrics.response_time_ms,
                    result.metrics.token_count,
                    result.metrics.cost,
                    result.response.lines().next().unwrap_or_default(),
                );
            }
            let summary = prompts::summarize(&results);
            println!(
                "{} runs, avg {}ms, {} tokens, ${}",
                summary.runs,
                summary.average_response_time_ms,
                summary.total_tokens,
                summary.total_cost
            );
        }
    }

    Ok(())
}

/// Resolve a stage id or name to its position.
fn stage_index(stage: &str) -> anyhow::Result<usize> {
    match DEFAULT_STAGES
        .iter()
        .position(|(id, name)| id.eq_ignore_ascii_case(stage) || name.eq_ignore_ascii_case(stage))
    {
        Some(index) => Ok(index),
        None => {
            let known: Vec<&str> = DEFAULT_STAGES.iter().map(|(id, _)| *id).collect();
            bail!("unknown stage '{}'; expected one of {}", stage, known.join(", "))
        }
    }
}

struct ProgressPrinter;

impl PipelineObserver for ProgressPrinter {
    fn on_update(&self, run: &PipelineRun) {
        if run.status.is_terminal() {
            return;
        }
        if let Some((index, stage)) = run.current_stage() {
            println!(
                "[{}/{}] {} running...",
                index + 1,
                run.stages.len(),
                stage.name
            );
        }
    }
}

fn print_summary(run: &PipelineRun) {
    println!(
        "{} {} on {}@{}: {}",
        run.name, run.id, run.branch, run.commit, run.status
    );
    for stage in &run.stages {
        let took = stage
            .duration_ms()
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<14} {:<8} {}", stage.name, stage.status, took);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_index_accepts_id_or_name() {
        assert_eq!(stage_index("build").unwrap(), 0);
        assert_eq!(stage_index("Security Scan").unwrap(), 2);
        assert_eq!(stage_index("DEPLOY").unwrap(), 3);
        assert!(stage_index("lint").is_err());
    }
}
