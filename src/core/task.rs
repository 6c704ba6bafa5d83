//! Task data model for the execution graph.
//!
//! Tasks are the atomic units of work handed to agents. Each task tracks
//! its status, scheduling hints (tier, estimate, required capabilities),
//! requirement traceability, and timing.

use crate::core::agent::AgentId;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a task within one store.
///
/// Task ids come from the plan document (e.g. `"3.2"` for a numbered
/// checklist item) or are assigned by the caller, so this is a string
/// newtype rather than a generated UUID. Ordering is lexicographic and is
/// used as the deterministic tie-break in scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Task status in its lifecycle.
///
/// The stored state machine is `NotStarted -> InProgress -> {Completed |
/// Failed}`. Completed and Failed are terminal. "Blocked" is a derived,
/// report-only condition (a not-started task with unsatisfied
/// dependencies) and is never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Not yet picked up by the driver.
    NotStarted,
    /// Currently executing on an agent.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed {
        /// Why the execution failed (executor message, timeout, cancellation).
        reason: String,
    },
}

impl TaskStatus {
    /// Short status label without any payload, used in reports and
    /// transition errors.
    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed { .. } => "failed",
        }
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed { .. })
    }

    /// Whether `from -> to` is a legal move in the state machine.
    ///
    /// Legal moves are exactly `NotStarted -> InProgress`,
    /// `InProgress -> Completed`, and `InProgress -> Failed`. Everything
    /// else, including self-transitions and any move out of a terminal
    /// state, is rejected.
    pub fn can_transition(from: &TaskStatus, to: &TaskStatus) -> bool {
        matches!(
            (from, to),
            (TaskStatus::NotStarted, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed { .. })
        )
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Failed { reason } => write!(f, "failed: {}", reason),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// A single unit of work in the execution graph.
///
/// Dependency edges live in the [`TaskStore`](crate::core::TaskStore);
/// `depends_on` holds the declared dependency ids as parsed from the plan
/// and is kept in sync when edges are wired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Human-readable name.
    pub name: String,
    /// Free-text description of the work.
    pub description: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Priority tier; lower runs earlier among ready tasks.
    pub tier: u32,
    /// Estimated effort in minutes, if the plan declared one.
    pub estimate_min: Option<u32>,
    /// Capability tags an agent must offer to run this task.
    pub capabilities: Vec<String>,
    /// Requirement-traceability references. These are documentation ids
    /// from the plan and are never resolved against task ids.
    pub requirement_refs: Vec<String>,
    /// Declared dependency task ids.
    pub depends_on: Vec<TaskId>,
    /// Agent that ran (or is running) this task.
    pub assigned_agent: Option<AgentId>,
    /// When the task record was created.
    pub created_at: DateTime<Utc>,
    /// When execution started.
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a task in `NotStarted` with the given id and name.
    pub fn new(id: impl Into<TaskId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            description: String::new(),
            status: TaskStatus::NotStarted,
            tier: 0,
            estimate_min: None,
            capabilities: Vec::new(),
            requirement_refs: Vec::new(),
            depends_on: Vec::new(),
            assigned_agent: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_estimate_min(mut self, minutes: u32) -> Self {
        self.estimate_min = Some(minutes);
        self
    }

    pub fn with_capability(mut self, tag: &str) -> Self {
        self.capabilities.push(tag.to_string());
        self
    }

    pub fn with_requirement_refs(mut self, refs: &[&str]) -> Self {
        self.requirement_refs = refs.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_depends_on(mut self, ids: &[&str]) -> Self {
        self.depends_on = ids.iter().map(|id| TaskId::from(*id)).collect();
        self
    }

    /// Apply a validated status transition, stamping timing fields.
    ///
    /// Returns [`Error::InvalidTransition`] when the move is not allowed
    /// by the state machine. Invalid transitions indicate a driver logic
    /// bug and are meant to surface loudly, not be swallowed.
    pub fn set_status(&mut self, new: TaskStatus) -> Result<()> {
        if !TaskStatus::can_transition(&self.status, &new) {
            return Err(Error::InvalidTransition {
                task: self.id.clone(),
                from: self.status.name().to_string(),
                to: new.name().to_string(),
            });
        }
        match &new {
            TaskStatus::InProgress => self.started_at = Some(Utc::now()),
            TaskStatus::Completed | TaskStatus::Failed { .. } => {
                self.finished_at = Some(Utc::now())
            }
            TaskStatus::NotStarted => {}
        }
        self.status = new;
        Ok(())
    }

    /// Record which agent this task ran on.
    pub fn assign_agent(&mut self, agent: AgentId) {
        self.assigned_agent = Some(agent);
    }

    /// Check if the task is in a terminal state (Completed or Failed).
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
