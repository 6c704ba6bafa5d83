//! The pluggable task-execution seam.
//!
//! The driver treats execution as a boundary call that returns success
//! or failure. Real work dispatch (invoking an external worker, a
//! process, an API) plugs in behind [`TaskExecutor`]; the crate ships a
//! no-op executor and a bounded-sleep simulator for dry runs, demos,
//! and tests.

use crate::core::task::{Task, TaskId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one task execution. Failure is data, not an error: the
/// driver records it and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ExecOutcome {
    Success,
    Failure {
        /// Why the execution failed (executor message, timeout,
        /// cancellation).
        reason: String,
    },
}

impl ExecOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Success)
    }
}

/// Strategy interface the driver calls to run one task.
///
/// Implementations receive a cancellation token scoped to this one
/// execution; cooperative implementations should return a failure
/// outcome promptly once it fires. The driver additionally enforces any
/// configured timeout from the outside, so a non-cooperative
/// implementation still cannot wedge a run.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task, cancel: CancellationToken) -> ExecOutcome;
}

/// Executor that completes every task immediately.
///
/// Tasks listed in the failure set report failure instead; that is the
/// hook the CLI's `--fail` flag and the failure-path tests use.
#[derive(Debug, Default)]
pub struct InstantExecutor {
    fail: HashSet<TaskId>,
}

impl InstantExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(mut self, ids: &[&str]) -> Self {
        self.fail = ids.iter().map(|id| TaskId::from(*id)).collect();
        self
    }
}

#[async_trait]
impl TaskExecutor for InstantExecutor {
    async fn execute(&self, task: &Task, _cancel: CancellationToken) -> ExecOutcome {
        if self.fail.contains(&task.id) {
            ExecOutcome::failure("forced failure")
        } else {
            ExecOutcome::Success
        }
    }
}

/// Executor that sleeps for a bounded interval before reporting.
///
/// The sleep is `base_delay` scaled by the task's estimate in minutes
/// (an unestimated task counts as 1), so bigger tasks visibly take
/// longer in simulations. Honors cancellation mid-sleep.
#[derive(Debug)]
pub struct SimulatedExecutor {
    base_delay: Duration,
    fail: HashSet<TaskId>,
}

impl SimulatedExecutor {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            fail: HashSet::new(),
        }
    }

    pub fn fail_on(mut self, ids: &[&str]) -> Self {
        self.fail = ids.iter().map(|id| TaskId::from(*id)).collect();
        self
    }

    fn delay_for(&self, task: &Task) -> Duration {
        self.base_delay
            .saturating_mul(task.estimate_min.unwrap_or(1).max(1))
    }
}

#[async_trait]
impl TaskExecutor for SimulatedExecutor {
    async fn execute(&self, task: &Task, cancel: CancellationToken) -> ExecOutcome {
        tokio::select! {
            _ = cancel.cancelled() => return ExecOutcome::failure("cancelled"),
            _ = tokio::time::sleep(self.delay_for(task)) => {}
        }
        if self.fail.contains(&task.id) {
            ExecOutcome::failure("simulated failure")
        } else {
            ExecOutcome::Success
        }
    }
}
