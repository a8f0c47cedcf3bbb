//! Simulated deployment pipeline.

pub mod simulator;
pub mod state;

pub use simulator::{
    PipelineHandle, PipelineObserver, PipelineRequest, PipelineSimulator, ScriptedExecutor,
    SimulatedExecutor, StageExecutor, StageOutcome,
};
pub use state::{
    DEFAULT_STAGES, PipelineRun, RunStatus, Stage, StageStatus, format_duration,
};
