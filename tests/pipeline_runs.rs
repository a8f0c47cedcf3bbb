//! Deployment pipeline runs driven on a paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use command_center::config::PipelineConfig;
use command_center::pipeline::{
    PipelineRequest, PipelineRun, PipelineSimulator, RunStatus, ScriptedExecutor, StageOutcome,
    StageStatus,
};

fn simulator(executor: ScriptedExecutor) -> PipelineSimulator {
    PipelineSimulator::new(Arc::new(executor), &PipelineConfig::default())
}

fn statuses(run: &PipelineRun) -> Vec<StageStatus> {
    run.stages.iter().map(|s| s.status).collect()
}

#[tokio::test(start_paused = true)]
async fn failing_second_stage_skips_the_rest() {
    let sim = simulator(ScriptedExecutor::fail_at(1, Duration::from_secs(1)));
    let run = sim.run(PipelineRequest::default()).await.unwrap();

    use StageStatus::*;
    assert_eq!(statuses(&run), vec![Success, Failed, Skipped, Skipped]);
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.finished_at.is_some());
    assert!(run.stages[2].started_at.is_none());
    assert!(run.stages[1].logs.iter().any(|l| l.contains("failed")));
}

#[tokio::test(start_paused = true)]
async fn all_stages_succeed() {
    let sim = simulator(ScriptedExecutor::all_succeed(Duration::from_secs(12)));
    let started = tokio::time::Instant::now();
    let run = sim.run(PipelineRequest::default()).await.unwrap();

    assert_eq!(run.status, RunStatus::Success);
    assert!(run.stages.iter().all(|s| s.status == StageStatus::Success));
    assert!(run.stages.iter().all(|s| s.duration_ms().is_some()));
    assert!(run.duration_ms().is_some());
    assert!(started.elapsed() >= Duration::from_secs(48));
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_run_stops_progress() {
    let sim = simulator(ScriptedExecutor::new(vec![
        StageOutcome::success(Duration::from_secs(5)),
        StageOutcome::success(Duration::from_secs(60)),
    ]));
    let handle = sim.start(PipelineRequest::default()).unwrap();
    let id = handle.id().to_string();

    tokio::time::sleep(Duration::from_secs(10)).await;
    handle.cancel();
    let run = handle.wait().await.unwrap();

    use StageStatus::*;
    assert_eq!(run.id, id);
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(statuses(&run), vec![Success, Running, Pending, Pending]);
    assert_eq!(sim.history().await[0].id, id);
}

#[tokio::test(start_paused = true)]
async fn observer_sees_every_transition() {
    let seen: Arc<Mutex<Vec<(RunStatus, Vec<StageStatus>)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sim = simulator(ScriptedExecutor::fail_at(2, Duration::from_secs(1))).with_observer(
        Arc::new(move |run: &PipelineRun| {
            sink.lock()
                .unwrap()
                .push((run.status, run.stages.iter().map(|s| s.status).collect()));
        }),
    );

    sim.run(PipelineRequest::default()).await.unwrap();

    let seen = seen.lock().unwrap();
    use StageStatus::*;
    // Initial snapshot, then start and finish of stages 1 to 3.
    assert_eq!(seen.len(), 7);
    assert_eq!(seen[0].0, RunStatus::Pending);
    assert_eq!(seen[1].1, vec![Running, Pending, Pending, Pending]);
    assert_eq!(
        seen.last().unwrap(),
        &(RunStatus::Failed, vec![Success, Success, Failed, Skipped])
    );
}

#[tokio::test(start_paused = true)]
async fn custom_stages_and_request_fields_are_kept() {
    let sim = simulator(ScriptedExecutor::all_succeed(Duration::from_millis(200)));
    let run = sim
        .run(PipelineRequest {
            name: "Staging".to_string(),
            branch: "feature/login".to_string(),
            stages: vec![("lint".to_string(), "Lint".to_string())],
            ..PipelineRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(run.name, "Staging");
    assert_eq!(run.branch, "feature/login");
    assert_eq!(run.stages.len(), 1);
    assert_eq!(run.status, RunStatus::Success);
}

#[tokio::test]
async fn empty_stage_list_is_rejected() {
    let sim = simulator(ScriptedExecutor::all_succeed(Duration::ZERO));
    let result = sim.start(PipelineRequest {
        stages: vec![],
        ..PipelineRequest::default()
    });
    assert!(result.is_err());
}
