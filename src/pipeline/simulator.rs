//! Simulated deployment pipeline driver.
//!
//! A run executes its stages in order on a background task. How long each
//! stage takes and whether it succeeds is decided by a [`StageExecutor`]; the
//! driver only sleeps for that long, applies the outcome and notifies
//! observers. Runs can be cancelled through their [`PipelineHandle`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::state::{DEFAULT_STAGES, PipelineRun, Stage, format_duration};

/// Decided result of one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub success: bool,
    pub duration: Duration,
}

impl StageOutcome {
    pub fn success(duration: Duration) -> Self {
        Self {
            success: true,
            duration,
        }
    }

    pub fn failure(duration: Duration) -> Self {
        Self {
            success: false,
            duration,
        }
    }
}

/// Decides the outcome of each stage.
pub trait StageExecutor: Send + Sync {
    fn execute(&self, index: usize, stage: &Stage) -> StageOutcome;
}

/// Random durations and outcomes.
pub struct SimulatedExecutor {
    min: Duration,
    max: Duration,
    success_rate: f64,
}

impl SimulatedExecutor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min: config.min_stage_duration,
            max: config.max_stage_duration.max(config.min_stage_duration),
            success_rate: config.success_rate.clamp(0.0, 1.0),
        }
    }
}

impl StageExecutor for SimulatedExecutor {
    fn execute(&self, _index: usize, _stage: &Stage) -> StageOutcome {
        let mut rng = rand::thread_rng();
        let millis = rng.gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        StageOutcome {
            success: rng.gen_bool(self.success_rate),
            duration: Duration::from_millis(millis),
        }
    }
}

/// Fixed outcomes by stage index. Stages past the script succeed after
/// `default_duration`.
pub struct ScriptedExecutor {
    outcomes: Vec<StageOutcome>,
    default_duration: Duration,
}

impl ScriptedExecutor {
    pub fn new(outcomes: Vec<StageOutcome>) -> Self {
        Self {
            outcomes,
            default_duration: Duration::from_secs(1),
        }
    }

    /// Every stage succeeds after `duration`.
    pub fn all_succeed(duration: Duration) -> Self {
        Self {
            outcomes: Vec::new(),
            default_duration: duration,
        }
    }

    /// Stages before `index` succeed, stage `index` fails.
    pub fn fail_at(index: usize, duration: Duration) -> Self {
        let mut outcomes = vec![StageOutcome::success(duration); index];
        outcomes.push(StageOutcome::failure(duration));
        Self {
            outcomes,
            default_duration: duration,
        }
    }
}

impl StageExecutor for ScriptedExecutor {
    fn execute(&self, index: usize, _stage: &Stage) -> StageOutcome {
        self.outcomes
            .get(index)
            .cloned()
            .unwrap_or_else(|| StageOutcome::success(self.default_duration))
    }
}

/// Notified after every state change of a run.
pub trait PipelineObserver: Send + Sync {
    fn on_update(&self, run: &PipelineRun);
}

impl<F> PipelineObserver for F
where
    F: Fn(&PipelineRun) + Send + Sync,
{
    fn on_update(&self, run: &PipelineRun) {
        self(run)
    }
}

/// What to run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub name: String,
    pub branch: String,
    pub commit: String,
    pub triggered_by: String,
    /// `(id, name)` of each stage, in order.
    pub stages: Vec<(String, String)>,
}

impl Default for PipelineRequest {
    fn default() -> Self {
        let commit: String = Uuid::new_v4().simple().to_string().chars().take(7).collect();
        Self {
            name: "Production Deploy".to_string(),
            branch: "main".to_string(),
            commit,
            triggered_by: "current.user@example.com".to_string(),
            stages: DEFAULT_STAGES
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        }
    }
}

/// Control over a started run.
pub struct PipelineHandle {
    id: String,
    cancel_tx: watch::Sender<bool>,
    task: JoinHandle<PipelineRun>,
}

impl PipelineHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Request cancellation. Takes effect at the next suspension point of the run.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Wait for the run to finish and return its final state.
    pub async fn wait(self) -> Result<PipelineRun, PipelineError> {
        self.task
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))
    }
}

type History = Arc<RwLock<VecDeque<PipelineRun>>>;

pub struct PipelineSimulator {
    executor: Arc<dyn StageExecutor>,
    observers: Vec<Arc<dyn PipelineObserver>>,
    history: History,
    history_limit: usize,
}

impl PipelineSimulator {
    pub fn new(executor: Arc<dyn StageExecutor>, config: &PipelineConfig) -> Self {
        Self {
            executor,
            observers: Vec::new(),
            history: Arc::new(RwLock::new(VecDeque::new())),
            history_limit: config.history_limit,
        }
    }

    /// A simulator with random outcomes drawn from `config`.
    pub fn simulated(config: &PipelineConfig) -> Self {
        Self::new(Arc::new(SimulatedExecutor::new(config)), config)
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Start a run on a background task.
    pub fn start(&self, request: PipelineRequest) -> Result<PipelineHandle, PipelineError> {
        let stages = request
            .stages
            .into_iter()
            .map(|(id, name)| Stage::new(id, name))
            .collect();
        let run = PipelineRun::new(
            request.name,
            request.branch,
            request.commit,
            request.triggered_by,
            stages,
        )?;
        let id = run.id.clone();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let driver = Driver {
            executor: Arc::clone(&self.executor),
            observers: self.observers.clone(),
            history: Arc::clone(&self.history),
            history_limit: self.history_limit,
        };
        let task = tokio::spawn(driver.drive(run, cancel_rx));

        Ok(PipelineHandle {
            id,
            cancel_tx,
            task,
        })
    }

    /// Start a run and wait for it.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineRun, PipelineError> {
        self.start(request)?.wait().await
    }

    /// Finished runs, newest first.
    pub async fn history(&self) -> Vec<PipelineRun> {
        self.history.read().await.iter().cloned().collect()
    }
}

struct Driver {
    executor: Arc<dyn StageExecutor>,
    observers: Vec<Arc<dyn PipelineObserver>>,
    history: History,
    history_limit: usize,
}

impl Driver {
    fn notify(&self, run: &PipelineRun) {
        for observer in &self.observers {
            observer.on_update(run);
        }
    }

    async fn drive(self, mut run: PipelineRun, mut cancel_rx: watch::Receiver<bool>) -> PipelineRun {
        tracing::info!(
            "Pipeline {} started ({} on {}@{})",
            run.id,
            run.name,
            run.branch,
            run.commit
        );
        self.notify(&run);

        while !run.status.is_terminal() {
            if *cancel_rx.borrow_and_update() {
                self.cancel(&mut run);
                break;
            }

            let index = match run.start_next_stage(Utc::now()) {
                Ok(index) => index,
                Err(e) => {
                    tracing::warn!("Pipeline {} stopped: {}", run.id, e);
                    break;
                }
            };
            let stage_name = run.stages[index].name.clone();
            run.push_log(index, format!("Starting {}", stage_name));
            self.notify(&run);

            let outcome = self.executor.execute(index, &run.stages[index]);
            tokio::select! {
                _ = tokio::time::sleep(outcome.duration) => {}
                _ = cancel_requested(&mut cancel_rx) => {
                    self.cancel(&mut run);
                    break;
                }
            }

            let verdict = if outcome.success { "succeeded" } else { "failed" };
            run.push_log(
                index,
                format!("{} {} after {}", stage_name, verdict, format_duration(outcome.duration.as_millis() as u64)),
            );
            if let Err(e) = run.complete_stage(outcome.success, Utc::now()) {
                tracing::warn!("Pipeline {} stopped: {}", run.id, e);
                break;
            }
            tracing::debug!("Pipeline {} stage {} {}", run.id, stage_name, verdict);
            self.notify(&run);
        }

        tracing::info!("Pipeline {} finished: {}", run.id, run.status);
        let mut history = self.history.write().await;
        history.push_front(run.clone());
        history.truncate(self.history_limit);
        run
    }

    fn cancel(&self, run: &mut PipelineRun) {
        if run.cancel(Utc::now()).is_ok() {
            tracing::info!("Pipeline {} cancelled", run.id);
            self.notify(run);
        }
    }
}

/// Resolves once cancellation is requested. Never resolves if the handle is
/// dropped without cancelling.
async fn cancel_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::{RunStatus, StageStatus};

    #[test]
    fn test_scripted_fail_at() {
        let exec = ScriptedExecutor::fail_at(1, Duration::from_secs(2));
        let stage = Stage::new("x", "X");
        assert!(exec.execute(0, &stage).success);
        assert!(!exec.execute(1, &stage).success);
        assert!(exec.execute(2, &stage).success);
    }

    #[test]
    fn test_simulated_executor_respects_bounds() {
        let exec = SimulatedExecutor::new(&PipelineConfig {
            min_stage_duration: Duration::from_secs(10),
            max_stage_duration: Duration::from_secs(40),
            success_rate: 1.0,
            history_limit: 5,
        });
        let stage = Stage::new("x", "X");
        for _ in 0..50 {
            let outcome = exec.execute(0, &stage);
            assert!(outcome.success);
            assert!(outcome.duration >= Duration::from_secs(10));
            assert!(outcome.duration <= Duration::from_secs(40));
        }
    }

    #[test]
    fn test_default_request() {
        let req = PipelineRequest::default();
        assert_eq!(req.commit.len(), 7);
        let names: Vec<_> = req.stages.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(names, vec!["Build", "Test", "Security Scan", "Deploy"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_bounded_and_newest_first() {
        let sim = PipelineSimulator::new(
            Arc::new(ScriptedExecutor::all_succeed(Duration::from_secs(1))),
            &PipelineConfig {
                history_limit: 2,
                ..PipelineConfig::default()
            },
        );
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(sim.run(PipelineRequest::default()).await.unwrap().id);
        }
        let history: Vec<_> = sim.history().await.into_iter().map(|r| r.id).collect();
        assert_eq!(history, vec![ids[2].clone(), ids[1].clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_stage_finishes() {
        let sim = PipelineSimulator::new(
            Arc::new(ScriptedExecutor::all_succeed(Duration::from_secs(30))),
            &PipelineConfig::default(),
        );
        let handle = sim.start(PipelineRequest::default()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.cancel();
        let run = handle.wait().await.unwrap();

        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.stages[0].status, StageStatus::Running);
        assert!(run.stages[1..].iter().all(|s| s.status == StageStatus::Pending));
    }
}
