//! Pipeline run state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PipelineError;
use crate::models::new_id;

/// Stages every deployment runs, in order, as `(id, name)`.
pub const DEFAULT_STAGES: &[(&str, &str)] = &[
    ("build", "Build"),
    ("test", "Test"),
    ("security", "Security Scan"),
    ("deploy", "Deploy"),
];

/// State of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    /// Never reached because an earlier stage failed.
    Skipped,
}

impl StageStatus {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: StageStatus) -> bool {
        use StageStatus::*;

        matches!(
            (self, target),
            (Pending, Running) | (Pending, Skipped) | (Running, Success) | (Running, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.pad(s)
    }
}

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub name: String,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub logs: Vec<String>,
}

impl Stage {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: StageStatus::Pending,
            started_at: None,
            finished_at: None,
            logs: Vec::new(),
        }
    }

    /// Elapsed milliseconds between start and finish. Never negative.
    pub fn duration_ms(&self) -> Option<u64> {
        let (start, end) = (self.started_at?, self.finished_at?);
        Some((end - start).num_milliseconds().max(0) as u64)
    }

    fn transition(&mut self, target: StageStatus) -> Result<(), PipelineError> {
        if !self.status.can_transition_to(target) {
            return Err(PipelineError::InvalidTransition {
                stage: self.name.clone(),
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }
}

/// One execution of a deployment pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: String,
    pub name: String,
    pub branch: String,
    pub commit: String,
    pub triggered_by: String,
    pub status: RunStatus,
    pub stages: Vec<Stage>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(
        name: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
        triggered_by: impl Into<String>,
        stages: Vec<Stage>,
    ) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::NoStages);
        }
        Ok(Self {
            id: new_id("pipeline"),
            name: name.into(),
            branch: branch.into(),
            commit: commit.into(),
            triggered_by: triggered_by.into(),
            status: RunStatus::Pending,
            stages,
            started_at: Utc::now(),
            finished_at: None,
        })
    }

    /// The stage currently running, if any.
    pub fn current_stage(&self) -> Option<(usize, &Stage)> {
        self.stages
            .iter()
            .enumerate()
            .find(|(_, s)| s.status == StageStatus::Running)
    }

    pub fn duration_ms(&self) -> Option<u64> {
        let end = self.finished_at?;
        Some((end - self.started_at).num_milliseconds().max(0) as u64)
    }

    fn ensure_active(&self) -> Result<(), PipelineError> {
        if self.status.is_terminal() {
            return Err(PipelineError::AlreadyFinished(self.id.clone()));
        }
        Ok(())
    }

    /// Start the first pending stage. Its predecessor must have succeeded.
    pub fn start_next_stage(&mut self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        self.ensure_active()?;

        let index = self
            .stages
            .iter()
            .position(|s| s.status == StageStatus::Pending)
            .ok_or_else(|| PipelineError::NoRunningStage(self.id.clone()))?;

        if let Some(prev) = index.checked_sub(1).map(|i| &self.stages[i])
            && prev.status != StageStatus::Success
        {
            return Err(PipelineError::InvalidTransition {
                stage: self.stages[index].name.clone(),
                from: StageStatus::Pending.to_string(),
                to: StageStatus::Running.to_string(),
            });
        }

        let stage = &mut self.stages[index];
        stage.transition(StageStatus::Running)?;
        stage.started_at = Some(now);
        self.status = RunStatus::Running;
        Ok(index)
    }

    /// Finish the running stage. A failure skips every later stage and fails
    /// the run; the last success completes it.
    pub fn complete_stage(
        &mut self,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        self.ensure_active()?;

        let index = self
            .current_stage()
            .map(|(i, _)| i)
            .ok_or_else(|| PipelineError::NoRunningStage(self.id.clone()))?;

        let stage = &mut self.stages[index];
        stage.transition(if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        })?;
        stage.finished_at = Some(now);

        if !success {
            for later in &mut self.stages[index + 1..] {
                later.transition(StageStatus::Skipped)?;
            }
            self.status = RunStatus::Failed;
            self.finished_at = Some(now);
        } else if index + 1 == self.stages.len() {
            self.status = RunStatus::Success;
            self.finished_at = Some(now);
        }

        Ok(index)
    }

    /// Cancel the run. Finished stages keep their state; a running stage is
    /// abandoned as it is.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), PipelineError> {
        self.ensure_active()?;
        self.status = RunStatus::Cancelled;
        self.finished_at = Some(now);
        Ok(())
    }

    pub fn push_log(&mut self, index: usize, line: impl Into<String>) {
        if let Some(stage) = self.stages.get_mut(index) {
            stage.logs.push(line.into());
        }
    }
}

/// Render milliseconds as `"1m 5s"` or `"42s"`.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
