//! End-to-end execution scenarios.
//!
//! Each test drives the full path: a plan file on disk, parsing, store
//! construction, and a driver run. Executors are the built-in instant
//! and simulated ones, so runs are fast and deterministic.

use std::sync::Arc;

use tokio::sync::mpsc;

use stampede::orchestration::{
    AgentPool, DriverConfig, DriverEvent, ExecutionDriver, InstantExecutor,
};
use stampede::plan::{build_store, load_plan};
use stampede::{Agent, AgentId, RunOutcome, TaskId};

use crate::fixtures::{uniform_pool, PlanFile};

/// Run a plan file to completion and hand back the driver and summary.
async fn run_plan(
    plan: &PlanFile,
    pool: AgentPool,
    executor: InstantExecutor,
) -> (ExecutionDriver, stampede::RunSummary, Vec<DriverEvent>) {
    let store = build_store(load_plan(&plan.path).expect("plan should parse"))
        .expect("store should build");

    let (tx, mut rx) = mpsc::channel(64);
    let mut driver = ExecutionDriver::new(store, pool, Arc::new(executor)).with_events(tx);
    let summary = driver.run().await.expect("run should finish");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (driver, summary, events)
}

/// Test: Fan-out with a single agent
/// Given tasks 1, 2 <- 1, 3 <- 1 and one agent of capacity 1
/// When the driver runs
/// Then 1 starts first and 2, 3 follow one at a time, all completed
#[tokio::test]
async fn test_fan_out_single_agent_runs_in_order() {
    let plan = PlanFile::new(
        "- [ ] 1. Root\n- [ ] 2. Left\n  _Dependencies: 1_\n- [ ] 3. Right\n  _Dependencies: 1_",
    );

    let (_, summary, events) = run_plan(&plan, uniform_pool(1), InstantExecutor::new()).await;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert_eq!(summary.counts.completed, 3);

    let started: Vec<TaskId> = events
        .iter()
        .filter_map(|e| match e {
            DriverEvent::TaskStarted { task, .. } => Some(task.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        started,
        vec![TaskId::from("1"), TaskId::from("2"), TaskId::from("3")],
        "Root must run first, then the dependents in id order"
    );
}

/// Test: Dependency cycle
/// Given tasks X and Y depending on each other
/// When the driver runs
/// Then it stalls immediately with both tasks still not started
#[tokio::test]
async fn test_cycle_stalls_immediately() {
    let plan = PlanFile::new(
        "- [ ] 1. X\n  _Dependencies: 2_\n- [ ] 2. Y\n  _Dependencies: 1_",
    );

    let (_, summary, events) = run_plan(&plan, uniform_pool(2), InstantExecutor::new()).await;

    assert_eq!(summary.outcome, RunOutcome::Stalled);
    assert_eq!(summary.iterations, 1, "Stall must be detected on the first pass");
    assert_eq!(summary.counts.not_started, 2);
    assert_eq!(summary.counts.completed, 0);

    let blocked_ids: Vec<&TaskId> = summary.blocked.iter().map(|b| &b.id).collect();
    assert_eq!(blocked_ids, vec![&TaskId::from("1"), &TaskId::from("2")]);
    assert!(events
        .iter()
        .all(|e| !matches!(e, DriverEvent::TaskStarted { .. })));
}

/// Test: Parallel dispatch
/// Given two independent tasks and two agents of capacity 1
/// When the driver runs
/// Then both tasks start before either completes
#[tokio::test]
async fn test_independent_tasks_start_in_parallel() {
    let plan = PlanFile::new("- [ ] 1. First\n- [ ] 2. Second");

    let (_, summary, events) = run_plan(&plan, uniform_pool(2), InstantExecutor::new()).await;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    assert!(
        matches!(events[0], DriverEvent::TaskStarted { .. })
            && matches!(events[1], DriverEvent::TaskStarted { .. }),
        "Both tasks must be dispatched in the same pass, got {events:?}"
    );
}

/// Test: Failure blocks dependents
/// Given task 2 depending on task 1, with 1 forced to fail
/// When the driver runs
/// Then 2 never starts and the summary reports it blocked
#[tokio::test]
async fn test_failed_dependency_blocks_dependent_forever() {
    let plan = PlanFile::new("- [ ] 1. Build\n- [ ] 2. Deploy\n  _Dependencies: 1_");

    let (driver, summary, events) = run_plan(
        &plan,
        uniform_pool(1),
        InstantExecutor::new().fail_on(&["1"]),
    )
    .await;

    assert_eq!(summary.outcome, RunOutcome::Stalled);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(summary.counts.not_started, 1);

    assert!(
        !events.iter().any(|e| matches!(
            e,
            DriverEvent::TaskStarted { task, .. } if *task == TaskId::from("2")
        )),
        "The dependent must never be dispatched"
    );

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].id, TaskId::from("1"));
    assert_eq!(summary.blocked.len(), 1);
    assert_eq!(summary.blocked[0].id, TaskId::from("2"));
    assert_eq!(summary.blocked[0].missing, vec![TaskId::from("1")]);

    // The store still holds the dependent untouched.
    let task = driver.store().get(&TaskId::from("2")).unwrap();
    assert!(task.assigned_agent.is_none());
}

/// Test: Capability routing from plan annotations
/// Given a task requiring the database tag and a mixed roster
/// When the driver runs
/// Then the tagged agent gets the tagged task
#[tokio::test]
async fn test_capabilities_route_to_matching_agent() {
    let plan = PlanFile::new(
        "- [ ] 1. Migrate schema\n  _Capabilities: database_\n- [ ] 2. Update styles",
    );

    let mut pool = AgentPool::new();
    pool.register(Agent::new("web", "Web Agent")).unwrap();
    pool.register(Agent::new("dba", "Database Agent").with_capability("database"))
        .unwrap();

    let (driver, summary, _) = run_plan(&plan, pool, InstantExecutor::new()).await;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    let migrate = driver.store().get(&TaskId::from("1")).unwrap();
    assert_eq!(migrate.assigned_agent, Some(AgentId::from("dba")));
    let styles = driver.store().get(&TaskId::from("2")).unwrap();
    assert_eq!(styles.assigned_agent, Some(AgentId::from("web")));
}

/// Test: Capability nobody offers still shows up in the report
/// Given a task requiring a tag no agent in the roster carries
/// When the driver runs
/// Then it stalls and the summary names the task as ready but unassigned
#[tokio::test]
async fn test_uncovered_capability_stall_names_the_task() {
    let plan = PlanFile::new("- [ ] 1. Train model\n  _Capabilities: gpu_");

    let (_, summary, events) = run_plan(&plan, uniform_pool(1), InstantExecutor::new()).await;

    assert_eq!(summary.outcome, RunOutcome::Stalled);
    assert!(summary.failed.is_empty());
    assert!(summary.blocked.is_empty());
    assert_eq!(summary.ready.len(), 1);
    assert_eq!(summary.ready[0].id, TaskId::from("1"));
    assert_eq!(summary.ready[0].capabilities, vec!["gpu".to_string()]);

    let rendered = summary.render();
    assert!(
        rendered.contains("ready but unassigned:") && rendered.contains("1 Train model (needs: gpu)"),
        "The report must name the undispatchable task, got:\n{rendered}"
    );

    assert!(
        events.iter().any(|e| matches!(
            e,
            DriverEvent::Stalled { ready, .. } if ready == &vec![TaskId::from("1")]
        )),
        "The stall event must carry the ready id"
    );
}

/// Test: Checked-off tasks short-circuit
/// Given a plan where the root is already checked off
/// When the driver runs
/// Then only the dependent executes and the run completes
#[tokio::test]
async fn test_checked_off_root_unblocks_dependent() {
    let plan = PlanFile::new("- [x] 1. Done earlier\n- [ ] 2. Next step\n  _Dependencies: 1_");

    let (_, summary, events) = run_plan(&plan, uniform_pool(1), InstantExecutor::new()).await;

    assert_eq!(summary.outcome, RunOutcome::Completed);
    let started: Vec<&TaskId> = events
        .iter()
        .filter_map(|e| match e {
            DriverEvent::TaskStarted { task, .. } => Some(task),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![&TaskId::from("2")], "Only the pending task may run");
}

/// Test: Iteration bound
/// Given a five-task chain and a two-iteration limit
/// When the driver runs
/// Then it stops at the limit with the tail of the chain untouched
#[tokio::test]
async fn test_iteration_limit_stops_chain_early() {
    let plan = PlanFile::new(
        "\
- [ ] 1. Step one
- [ ] 2. Step two
  _Dependencies: 1_
- [ ] 3. Step three
  _Dependencies: 2_
- [ ] 4. Step four
  _Dependencies: 3_
- [ ] 5. Step five
  _Dependencies: 4_",
    );

    let store = build_store(load_plan(&plan.path).unwrap()).unwrap();
    let config = DriverConfig {
        max_iterations: 2,
        task_timeout: None,
    };
    let mut driver =
        ExecutionDriver::new(store, uniform_pool(1), Arc::new(InstantExecutor::new()))
            .with_config(config);
    let summary = driver.run().await.unwrap();

    assert_eq!(summary.outcome, RunOutcome::IterationLimit);
    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.counts.completed, 2);
    assert_eq!(summary.counts.not_started, 3);
    assert_eq!(driver.in_flight_count(), 0, "Nothing may be left in flight");
}
