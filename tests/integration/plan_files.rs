//! Plan parsing from files on disk.
//!
//! The unit tests in `plan.rs` cover line-level grammar; these cover
//! the file boundary: IO failures, line numbers in errors, and
//! documents as editors actually save them.

use stampede::plan::{build_store, load_plan, plan_waves};
use stampede::{Error, TaskId, TaskStatus};

use crate::fixtures::PlanFile;

/// Test: Missing file
/// Given a path that does not exist
/// When load_plan is called
/// Then an IO error is returned
#[test]
fn test_load_plan_missing_file_is_io_error() {
    let err = load_plan(std::path::Path::new("/nonexistent/plan.md")).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

/// Test: Full document from disk
/// Given a realistic plan file
/// When loaded
/// Then ids, statuses, annotations, and edges all come through
#[test]
fn test_load_full_document() {
    let plan = PlanFile::new(
        r#"# Release checklist

Ship the staging warehouse first.

- [ ] 1. Provision the warehouse schema
  Tables, indexes, and grants.
  _Capabilities: database_
  _Estimate: 2h_
- [ ] 1.1 Backfill reference data
  _Dependencies: 1_
  _Requirements: DATA-4_
- [x] 2. Reserve the deploy window
- [ ] 3. Cut over ingestion
  _Dependencies: 1.1, 2_
"#,
    );

    let tasks = load_plan(&plan.path).unwrap();
    assert_eq!(tasks.len(), 4);
    assert_eq!(tasks[0].id, TaskId::from("1"));
    assert_eq!(tasks[0].estimate_min, Some(120));
    assert_eq!(tasks[1].requirement_refs, vec!["DATA-4"]);
    assert!(tasks[1].depends_on.contains(&TaskId::from("1")));
    assert_eq!(tasks[2].status, TaskStatus::Completed);

    let store = build_store(tasks).unwrap();
    assert_eq!(store.len(), 4);
    assert_eq!(store.dependency_count(), 3);

    let waves = plan_waves(&store).unwrap();
    assert!(waves.is_complete());
    assert_eq!(waves.wave_count(), 3);
}

/// Test: Error line numbers
/// Given a file with a bad annotation partway down
/// When loaded
/// Then the error carries that file line number
#[test]
fn test_error_reports_file_line_number() {
    let plan = PlanFile::new(
        "# Plan\n\n- [ ] 1. Fine task\n  fine description\n  _Estimate: whenever_\n",
    );

    let err = load_plan(&plan.path).unwrap_err();
    match err {
        Error::Plan { line, message } => {
            assert_eq!(line, 5);
            assert!(message.contains("whenever"));
        }
        other => panic!("expected Plan error, got {other:?}"),
    }
}

/// Test: Dangling dependency from a file
/// Given a plan declaring a dependency on an id it never defines
/// When the store is built
/// Then UnknownDependency names both sides
#[test]
fn test_dangling_dependency_from_file() {
    let plan = PlanFile::new("- [ ] 1. Deploy\n  _Dependencies: approval_\n");

    let tasks = load_plan(&plan.path).unwrap();
    let err = build_store(tasks).unwrap_err();
    match err {
        Error::UnknownDependency { task, dependency } => {
            assert_eq!(task, TaskId::from("1"));
            assert_eq!(dependency, TaskId::from("approval"));
        }
        other => panic!("expected UnknownDependency, got {other:?}"),
    }
}

/// Test: Windows line endings
/// Given a plan file saved with CRLF line endings
/// When loaded
/// Then titles and annotation values parse without stray carriage returns
#[test]
fn test_crlf_line_endings() {
    let plan = PlanFile::new(
        "- [ ] 1. First\r\n  _Estimate: 45_\r\n- [ ] 2. Second\r\n  _Dependencies: 1_\r\n",
    );

    let tasks = load_plan(&plan.path).unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].name, "First");
    assert_eq!(tasks[0].estimate_min, Some(45));
    assert_eq!(tasks[1].depends_on, vec![TaskId::from("1")]);
}

/// Test: Empty file
/// Given an empty plan file
/// When loaded
/// Then the task list is empty rather than an error
#[test]
fn test_empty_file_loads_no_tasks() {
    let plan = PlanFile::new("");
    assert!(load_plan(&plan.path).unwrap().is_empty());
}
