use std::path::{Path, PathBuf};

use git2::Repository;
use serde::{Deserialize, Serialize};

use crate::{stlog_debug, Result};

/// Git context recorded alongside a run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Checked-out branch name, or `None` when HEAD is detached.
    pub branch: Option<String>,
    /// Short hash of the HEAD commit.
    pub commit: String,
}

/// Git operations for the repository a plan file lives in.
///
/// Execution itself never touches git; this only captures where a run
/// started and optionally marks that point with a branch.
#[derive(Debug)]
pub struct RepoSnapshot {
    repo_path: PathBuf,
}

impl RepoSnapshot {
    pub fn discover(path: &Path) -> Result<Self> {
        stlog_debug!("RepoSnapshot::discover path={}", path.display());
        let _ = Repository::discover(path)?;
        Ok(Self {
            repo_path: path.to_path_buf(),
        })
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::discover(&self.repo_path)?)
    }

    /// Capture the current branch and HEAD commit.
    pub fn capture(&self) -> Result<SnapshotInfo> {
        let repo = self.repo()?;
        let head = repo.head()?;
        let branch = if head.is_branch() {
            head.shorthand().map(String::from)
        } else {
            None
        };
        let commit = head.peel_to_commit()?;
        let info = SnapshotInfo {
            branch,
            commit: format!("{:.7}", commit.id()),
        };
        stlog_debug!(
            "RepoSnapshot::capture branch={:?} commit={}",
            info.branch,
            info.commit
        );
        Ok(info)
    }

    /// Create a branch at HEAD marking where a run started.
    pub fn create_run_branch(&self, branch: &str) -> Result<()> {
        stlog_debug!("RepoSnapshot::create_run_branch branch={}", branch);
        let repo = self.repo()?;
        let head = repo.head()?;
        let commit = head.peel_to_commit()?;
        repo.branch(branch, &commit, false)?;
        Ok(())
    }
}
