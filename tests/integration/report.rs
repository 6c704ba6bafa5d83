//! Run summary reporting.
//!
//! Verifies the JSON export shape stays stable for downstream tooling
//! and that the rendered report carries the diagnostic lists.

use std::sync::Arc;

use stampede::orchestration::{ExecutionDriver, InstantExecutor};
use stampede::plan::{build_store, load_plan};
use stampede::{RunOutcome, RunSummary, SnapshotInfo};

use crate::fixtures::{uniform_pool, PlanFile};

async fn summarize(content: &str, fail: &[&str]) -> RunSummary {
    let plan = PlanFile::new(content);
    let store = build_store(load_plan(&plan.path).unwrap()).unwrap();
    let executor = Arc::new(InstantExecutor::new().fail_on(fail));
    let mut driver = ExecutionDriver::new(store, uniform_pool(2), executor);
    driver.run().await.unwrap()
}

/// Test: JSON field shape
/// Given a completed run
/// When the summary is exported
/// Then the documented fields are present with consistent values
#[tokio::test]
async fn test_json_export_shape() {
    let summary = summarize("- [ ] 1. A\n- [ ] 2. B\n  _Dependencies: 1_", &[]).await;

    let json = summary.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["outcome"], "completed");
    assert_eq!(value["total"], 2);
    assert_eq!(value["counts"]["completed"], 2);
    assert_eq!(value["counts"]["not_started"], 0);
    assert_eq!(value["completion_rate"], 1.0);
    assert!(value["run_id"].is_string());
    assert!(value["duration_ms"].as_i64().unwrap() >= 0);
    assert_eq!(value["iterations"].as_u64().unwrap(), summary.iterations);
    assert!(value["failed"].as_array().unwrap().is_empty());
    assert!(value["ready"].as_array().unwrap().is_empty());
    assert!(value["blocked"].as_array().unwrap().is_empty());
    assert!(value["snapshot"].is_null());
}

/// Test: JSON round-trip
/// Given an exported summary
/// When parsed back
/// Then the outcome and counts survive
#[tokio::test]
async fn test_json_round_trip() {
    let summary = summarize("- [ ] 1. A", &[]).await;

    let parsed: RunSummary = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(parsed.run_id, summary.run_id);
    assert_eq!(parsed.outcome, RunOutcome::Completed);
    assert_eq!(parsed.counts, summary.counts);
    assert_eq!(parsed.total, summary.total);
}

/// Test: Failure reasons in the export
/// Given a run with a forced failure and a blocked dependent
/// When the summary is exported
/// Then both lists name the tasks and carry the reason
#[tokio::test]
async fn test_json_reports_failed_and_blocked() {
    let summary = summarize("- [ ] 1. Build\n- [ ] 2. Deploy\n  _Dependencies: 1_", &["1"]).await;

    let value: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(value["outcome"], "stalled");
    assert_eq!(value["failed"][0]["id"], "1");
    assert_eq!(value["failed"][0]["reason"], "forced failure");
    assert_eq!(value["blocked"][0]["id"], "2");
    assert_eq!(value["blocked"][0]["missing"][0], "1");
    assert!(value["ready"].as_array().unwrap().is_empty());
}

/// Test: Ready-but-unassigned tasks in the export
/// Given a stall caused by a capability tag no agent offers
/// When the summary is exported
/// Then the ready list names the task and its required tags
#[tokio::test]
async fn test_json_reports_ready_unassigned() {
    let summary = summarize("- [ ] 1. Train model\n  _Capabilities: gpu_", &[]).await;

    let value: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(value["outcome"], "stalled");
    assert_eq!(value["ready"][0]["id"], "1");
    assert_eq!(value["ready"][0]["name"], "Train model");
    assert_eq!(value["ready"][0]["capabilities"][0], "gpu");
    assert!(value["failed"].as_array().unwrap().is_empty());
    assert!(value["blocked"].as_array().unwrap().is_empty());
}

/// Test: Snapshot block in the export
/// Given a summary with captured git context
/// When exported and rendered
/// Then both surfaces show branch and commit
#[tokio::test]
async fn test_snapshot_appears_in_export_and_render() {
    let summary = summarize("- [ ] 1. A", &[]).await.with_snapshot(SnapshotInfo {
        branch: Some("main".to_string()),
        commit: "abc1234".to_string(),
    });

    let value: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(value["snapshot"]["branch"], "main");
    assert_eq!(value["snapshot"]["commit"], "abc1234");

    let rendered = summary.render();
    assert!(rendered.contains("git: main @ abc1234"));
}

/// Test: Rendered report on a stall
/// Given a stalled run
/// When rendered
/// Then the report names the failed task and what the blocked one waits on
#[tokio::test]
async fn test_render_includes_diagnostics() {
    let summary = summarize("- [ ] 1. Build\n- [ ] 2. Deploy\n  _Dependencies: 1_", &["1"]).await;

    let rendered = summary.render();
    assert!(rendered.contains("stalled"));
    assert!(rendered.contains("1 Build: forced failure"));
    assert!(rendered.contains("2 Deploy (waiting on: 1)"));
}
