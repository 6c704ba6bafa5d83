//! Task store and dependency graph.
//!
//! The store holds task records as graph nodes and dependency edges
//! between them, and answers the scheduling queries the driver needs:
//! which tasks are ready, which are blocked and why, and aggregate
//! status counts. It performs no I/O.

use crate::core::agent::AgentId;
use crate::core::task::{Task, TaskId, TaskStatus};
use crate::error::{Error, Result};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate task counts by status.
///
/// The sum of the four buckets always equals the store's task count;
/// reports rely on that invariant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.not_started + self.in_progress + self.completed + self.failed
    }
}

/// The task dependency graph and status store.
///
/// Nodes are tasks, edges run from a dependency to its dependent. The
/// store accepts cyclic edges: a cycle is not an insertion error but a
/// runtime condition the driver reports as a stall (and `detect_cycles`
/// surfaces statically). Dangling dependencies, by contrast, are data
/// errors and are rejected when the edge is wired.
///
/// One store is built per run and owned by a single driver; nothing in
/// here is shared or locked.
pub struct TaskStore {
    /// The underlying directed graph.
    graph: DiGraph<Task, ()>,
    /// Index from TaskId to NodeIndex for fast lookups.
    index: HashMap<TaskId, NodeIndex>,
}

impl TaskStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a task.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateTask`] if the id is already present.
    pub fn insert(&mut self, task: Task) -> Result<()> {
        if self.index.contains_key(&task.id) {
            return Err(Error::DuplicateTask { id: task.id });
        }
        let id = task.id.clone();
        let index = self.graph.add_node(task);
        self.index.insert(id, index);
        Ok(())
    }

    /// Record that `task` depends on `depends_on`.
    ///
    /// Wiring the same pair twice is a no-op. The task's declared
    /// `depends_on` list is kept in sync with the edge set.
    ///
    /// # Errors
    /// [`Error::TaskNotFound`] if `task` is missing;
    /// [`Error::UnknownDependency`] if `depends_on` is missing (a
    /// dangling dependency in the plan data).
    pub fn add_dependency(&mut self, task: &TaskId, depends_on: &TaskId) -> Result<()> {
        let task_index = self.index_of(task)?;
        let dep_index =
            self.index
                .get(depends_on)
                .copied()
                .ok_or_else(|| Error::UnknownDependency {
                    task: task.clone(),
                    dependency: depends_on.clone(),
                })?;

        if self.graph.find_edge(dep_index, task_index).is_some() {
            return Ok(());
        }
        self.graph.add_edge(dep_index, task_index, ());

        if let Some(t) = self.graph.node_weight_mut(task_index) {
            if !t.depends_on.contains(depends_on) {
                t.depends_on.push(depends_on.clone());
            }
        }
        Ok(())
    }

    /// Get a task by id.
    pub fn get(&self, id: &TaskId) -> Result<&Task> {
        let index = self.index_of(id)?;
        self.graph
            .node_weight(index)
            .ok_or_else(|| Error::TaskNotFound { id: id.clone() })
    }

    /// Get a mutable task by id.
    pub fn get_mut(&mut self, id: &TaskId) -> Result<&mut Task> {
        let index = self.index_of(id)?;
        self.graph
            .node_weight_mut(index)
            .ok_or_else(|| Error::TaskNotFound { id: id.clone() })
    }

    /// Apply a validated status transition to a task.
    ///
    /// # Errors
    /// [`Error::TaskNotFound`] for an unknown id;
    /// [`Error::InvalidTransition`] when the state machine forbids the
    /// move (terminal states are absorbing).
    pub fn set_status(&mut self, id: &TaskId, new: TaskStatus) -> Result<()> {
        self.get_mut(id)?.set_status(new)
    }

    /// Record which agent a task was assigned to.
    pub fn record_assignment(&mut self, id: &TaskId, agent: AgentId) -> Result<()> {
        self.get_mut(id)?.assign_agent(agent);
        Ok(())
    }

    /// True iff every dependency of the task is `Completed`.
    ///
    /// A `Failed` dependency never satisfies its dependents; failure
    /// propagates by leaving them permanently blocked.
    pub fn dependencies_satisfied(&self, id: &TaskId) -> Result<bool> {
        let index = self.index_of(id)?;
        Ok(self.deps_completed(index))
    }

    /// All tasks eligible to run right now, in scheduling order.
    ///
    /// Eligible means status `NotStarted` with every dependency
    /// `Completed`. The order is ascending tier, then lexicographic task
    /// id, so repeated calls on an unchanged store return the identical
    /// list and scheduling is reproducible.
    pub fn ready_tasks(&self) -> Vec<&Task> {
        let mut ready: Vec<&Task> = self
            .graph
            .node_indices()
            .filter_map(|index| {
                let task = self.graph.node_weight(index)?;
                if task.status != TaskStatus::NotStarted {
                    return None;
                }
                self.deps_completed(index).then_some(task)
            })
            .collect();
        ready.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.id.cmp(&b.id)));
        ready
    }

    /// Owned ids of the ready tasks, in scheduling order.
    pub fn ready_task_ids(&self) -> Vec<TaskId> {
        self.ready_tasks().iter().map(|t| t.id.clone()).collect()
    }

    /// Not-started tasks that cannot run yet, with their unmet
    /// dependency ids. Derived for reporting; "blocked" is never a
    /// stored status.
    pub fn blocked_tasks(&self) -> Vec<(&Task, Vec<TaskId>)> {
        let mut blocked: Vec<(&Task, Vec<TaskId>)> = self
            .graph
            .node_indices()
            .filter_map(|index| {
                let task = self.graph.node_weight(index)?;
                if task.status != TaskStatus::NotStarted {
                    return None;
                }
                let mut missing: Vec<TaskId> = self
                    .graph
                    .neighbors_directed(index, Direction::Incoming)
                    .filter_map(|dep| {
                        let dep_task = self.graph.node_weight(dep)?;
                        (dep_task.status != TaskStatus::Completed).then(|| dep_task.id.clone())
                    })
                    .collect();
                if missing.is_empty() {
                    return None;
                }
                missing.sort();
                Some((task, missing))
            })
            .collect();
        blocked.sort_by(|a, b| a.0.tier.cmp(&b.0.tier).then_with(|| a.0.id.cmp(&b.0.id)));
        blocked
    }

    /// Tasks the given task depends on, sorted by id.
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<&Task> {
        self.neighbors_sorted(id, Direction::Incoming)
    }

    /// Tasks that depend on the given task, sorted by id.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<&Task> {
        self.neighbors_sorted(id, Direction::Outgoing)
    }

    /// All tasks in insertion order.
    pub fn all_tasks(&self) -> Vec<&Task> {
        self.graph.node_weights().collect()
    }

    /// Aggregate counts per status.
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for task in self.graph.node_weights() {
            match task.status {
                TaskStatus::NotStarted => counts.not_started += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }

    /// True when every task is `Completed`. Vacuously true for an empty
    /// store.
    pub fn all_completed(&self) -> bool {
        self.graph
            .node_weights()
            .all(|t| t.status == TaskStatus::Completed)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of dependency edges.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Cheap check for any cycle in the dependency edges.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// List dependency cycles as sorted groups of task ids.
    ///
    /// Uses strongly connected components; a single task only forms a
    /// cycle if it depends on itself.
    pub fn detect_cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| self.graph.find_edge(n, n).is_some())
            })
            .map(|scc| {
                let mut ids: Vec<TaskId> = scc
                    .iter()
                    .filter_map(|&n| self.graph.node_weight(n).map(|t| t.id.clone()))
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    fn index_of(&self, id: &TaskId) -> Result<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| Error::TaskNotFound { id: id.clone() })
    }

    fn deps_completed(&self, index: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(index, Direction::Incoming)
            .all(|dep| {
                self.graph
                    .node_weight(dep)
                    .map(|t| t.status == TaskStatus::Completed)
                    .unwrap_or(false)
            })
    }

    fn neighbors_sorted(&self, id: &TaskId, direction: Direction) -> Vec<&Task> {
        let Some(&index) = self.index.get(id) else {
            return Vec::new();
        };
        let mut tasks: Vec<&Task> = self
            .graph
            .neighbors_directed(index, direction)
            .filter_map(|n| self.graph.node_weight(n))
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.len())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
