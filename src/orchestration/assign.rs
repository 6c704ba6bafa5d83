//! Assignment policy: pairing ready tasks with available agents.
//!
//! Matching is a pure capability filter. "No match" is an expected
//! outcome the driver simply skips past, never an error; a task can
//! become matchable later when an agent frees up.

use crate::core::agent::Agent;
use crate::core::store::TaskStore;
use crate::core::task::{Task, TaskId};
use crate::orchestration::pool::AgentPool;

/// Find the agent for a task: the first available agent, in
/// registration order, whose capability tags intersect the task's
/// required tags. A task with no required tags takes the first
/// available agent.
pub fn match_agent<'a>(
    task: &Task,
    agents: impl IntoIterator<Item = &'a Agent>,
) -> Option<&'a Agent> {
    agents
        .into_iter()
        .find(|a| a.is_available() && a.can_run(&task.capabilities))
}

/// Tasks no registered agent could ever run, regardless of load.
///
/// These are guaranteed stall contributors; `analyze` reports them
/// before a run is attempted. Sorted by task id.
pub fn uncovered_tasks(store: &TaskStore, pool: &AgentPool) -> Vec<TaskId> {
    let mut uncovered: Vec<TaskId> = store
        .all_tasks()
        .iter()
        .filter(|t| !t.is_finished() && !pool.agents().any(|a| a.can_run(&t.capabilities)))
        .map(|t| t.id.clone())
        .collect();
    uncovered.sort();
    uncovered
}
