//! Repository snapshot capture against real git repos.
//!
//! Uses the shared `TestRepo` fixture, so these tests exercise the same
//! git plumbing the `--snapshot` flag does.

use stampede::snapshot::RepoSnapshot;
use stampede::Error;

use crate::fixtures::TestRepo;

/// Test: Capture on a fresh repository
/// Given a repo with one commit on its default branch
/// When a snapshot is captured
/// Then it records that branch and the short HEAD hash
#[test]
fn test_capture_records_branch_and_commit() {
    let repo = TestRepo::new();
    let snapshot = RepoSnapshot::discover(&repo.path).expect("Failed to discover repo");

    let info = snapshot.capture().expect("Failed to capture snapshot");
    assert_eq!(info.branch, Some(repo.current_branch()));
    assert_eq!(info.commit.len(), 7);
    assert!(repo.head_commit().starts_with(&info.commit));
}

/// Test: Run branch creation
/// Given a discovered repository
/// When a run branch is created
/// Then it exists and points at the commit the snapshot captured
#[test]
fn test_create_run_branch() {
    let repo = TestRepo::new();
    let branch_before = repo.current_branch();
    let snapshot = RepoSnapshot::discover(&repo.path).expect("Failed to discover repo");

    snapshot
        .create_run_branch("stampede/run-abcd1234")
        .expect("Failed to create run branch");

    assert!(repo.branch_exists("stampede/run-abcd1234"));
    // HEAD is unchanged; the branch is only a marker.
    assert_eq!(repo.current_branch(), branch_before);
}

/// Test: Duplicate run branch
/// Given a run branch that already exists
/// When creation is attempted again
/// Then the git error propagates instead of clobbering the branch
#[test]
fn test_create_run_branch_twice_fails() {
    let repo = TestRepo::new();
    let snapshot = RepoSnapshot::discover(&repo.path).expect("Failed to discover repo");

    snapshot
        .create_run_branch("stampede/run-abcd1234")
        .expect("Failed to create run branch");
    let err = snapshot
        .create_run_branch("stampede/run-abcd1234")
        .unwrap_err();
    assert!(matches!(err, Error::Git(_)));
}

/// Test: Discovery from a nested directory
/// Given a plan file in a subdirectory of the repo
/// When discovery starts from that subdirectory
/// Then it finds the enclosing repository
#[test]
fn test_discover_walks_up_from_subdirectory() {
    let repo = TestRepo::new();
    let nested = repo.path.join("plans");
    std::fs::create_dir(&nested).expect("Failed to create subdirectory");

    let snapshot = RepoSnapshot::discover(&nested).expect("Failed to discover repo");
    let info = snapshot.capture().expect("Failed to capture snapshot");
    assert!(repo.head_commit().starts_with(&info.commit));
}

/// Test: Discovery outside any repository
/// Given a directory that is not inside a git repo
/// When discovery is attempted
/// Then it fails with a git error
#[test]
fn test_discover_outside_repo_fails() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");

    let err = RepoSnapshot::discover(dir.path()).unwrap_err();
    assert!(matches!(err, Error::Git(_)));
}

/// Test: Detached HEAD
/// Given a repository with HEAD detached from any branch
/// When a snapshot is captured
/// Then the branch is absent but the commit is still recorded
#[test]
fn test_capture_on_detached_head() {
    let repo = TestRepo::new();
    repo.detach_head();

    let snapshot = RepoSnapshot::discover(&repo.path).expect("Failed to discover repo");
    let info = snapshot.capture().expect("Failed to capture snapshot");
    assert_eq!(info.branch, None);
    assert!(repo.head_commit().starts_with(&info.commit));
}
