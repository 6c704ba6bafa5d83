//! Run identity and end-of-run reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{StatusCounts, TaskId, TaskStatus, TaskStore};
use crate::error::Result;
use crate::snapshot::SnapshotInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// How a run ended.
///
/// `Completed` means every task reached `Completed`; the other two mean
/// the driver gave up with work left over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Stalled,
    IterationLimit,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Stalled => write!(f, "stalled"),
            RunOutcome::IterationLimit => write!(f, "iteration_limit"),
        }
    }
}

/// Timing and iteration bookkeeping for one driver run.
#[derive(Debug, Clone)]
pub struct ExecutionSession {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Dispatch-and-collect passes the driver has performed.
    pub iterations: u64,
}

impl ExecutionSession {
    pub fn start() -> Self {
        Self {
            id: RunId::new(),
            started_at: Utc::now(),
            finished_at: None,
            iterations: 0,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// A task that ended `Failed`, with the recorded reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTask {
    pub id: TaskId,
    pub name: String,
    pub reason: String,
}

/// A task left waiting on dependencies that never completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTask {
    pub id: TaskId,
    pub name: String,
    /// Dependency ids that are not `Completed`.
    pub missing: Vec<TaskId>,
}

/// A task whose dependencies were all met but that was never handed to
/// an agent, typically because no agent covers its capability tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyTask {
    pub id: TaskId,
    pub name: String,
    /// Capability tags the task requires.
    pub capabilities: Vec<String>,
}

/// Final report for a run: outcome, timing, per-status counts and the
/// tasks that failed, sat ready without an agent, or were left blocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub iterations: u64,
    pub counts: StatusCounts,
    pub total: usize,
    /// Completed over total, in `[0, 1]`. An empty plan counts as 1.0.
    pub completion_rate: f64,
    pub failed: Vec<FailedTask>,
    pub ready: Vec<ReadyTask>,
    pub blocked: Vec<BlockedTask>,
    #[serde(default)]
    pub snapshot: Option<SnapshotInfo>,
}

impl RunSummary {
    /// Build a summary from the final store state.
    pub fn from_store(store: &TaskStore, session: &ExecutionSession, outcome: RunOutcome) -> Self {
        let counts = store.status_counts();
        let total = store.len();
        let completion_rate = if total == 0 {
            1.0
        } else {
            counts.completed as f64 / total as f64
        };

        let failed: Vec<FailedTask> = store
            .all_tasks()
            .iter()
            .filter_map(|t| match &t.status {
                TaskStatus::Failed { reason } => Some(FailedTask {
                    id: t.id.clone(),
                    name: t.name.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();

        let ready: Vec<ReadyTask> = store
            .ready_tasks()
            .into_iter()
            .map(|t| ReadyTask {
                id: t.id.clone(),
                name: t.name.clone(),
                capabilities: t.capabilities.clone(),
            })
            .collect();

        let blocked: Vec<BlockedTask> = store
            .blocked_tasks()
            .into_iter()
            .map(|(t, missing)| BlockedTask {
                id: t.id.clone(),
                name: t.name.clone(),
                missing,
            })
            .collect();

        let finished_at = session.finished_at.unwrap_or_else(Utc::now);

        Self {
            run_id: session.id,
            outcome,
            started_at: session.started_at,
            finished_at,
            duration_ms: (finished_at - session.started_at).num_milliseconds(),
            iterations: session.iterations,
            counts,
            total,
            completion_rate,
            failed,
            ready,
            blocked,
            snapshot: None,
        }
    }

    pub fn with_snapshot(mut self, snapshot: SnapshotInfo) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text report for the console.
    pub fn render(&self) -> String {
        let headline = match self.outcome {
            RunOutcome::Completed => "all tasks completed",
            RunOutcome::Stalled => "stalled, no runnable tasks left",
            RunOutcome::IterationLimit => "stopped at iteration limit",
        };

        let mut out = format!("run {}: {}\n", self.run_id.short(), headline);
        out.push_str(&format!(
            "  {}/{} tasks completed ({:.1}%) in {} iterations ({} ms)\n",
            self.counts.completed,
            self.total,
            self.completion_rate * 100.0,
            self.iterations,
            self.duration_ms
        ));

        if !self.failed.is_empty() {
            out.push_str("  failed:\n");
            for f in &self.failed {
                out.push_str(&format!("    {} {}: {}\n", f.id, f.name, f.reason));
            }
        }

        if !self.ready.is_empty() {
            out.push_str("  ready but unassigned:\n");
            for r in &self.ready {
                if r.capabilities.is_empty() {
                    out.push_str(&format!("    {} {}\n", r.id, r.name));
                } else {
                    out.push_str(&format!(
                        "    {} {} (needs: {})\n",
                        r.id,
                        r.name,
                        r.capabilities.join(", ")
                    ));
                }
            }
        }

        if !self.blocked.is_empty() {
            out.push_str("  blocked:\n");
            for b in &self.blocked {
                let missing: Vec<String> = b.missing.iter().map(ToString::to_string).collect();
                out.push_str(&format!(
                    "    {} {} (waiting on: {})\n",
                    b.id,
                    b.name,
                    missing.join(", ")
                ));
            }
        }

        if let Some(snap) = &self.snapshot {
            match &snap.branch {
                Some(branch) => out.push_str(&format!("  git: {} @ {}\n", branch, snap.commit)),
                None => out.push_str(&format!("  git: detached @ {}\n", snap.commit)),
            }
        }

        out
    }
}
