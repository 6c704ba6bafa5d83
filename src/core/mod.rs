//! Core domain models for the execution engine.
//!
//! This module contains the fundamental data structures: tasks with
//! their status state machine, agents with bounded capacity, and the
//! dependency-graph store that answers scheduling queries.

pub mod agent;
pub mod store;
pub mod task;

pub use agent::{Agent, AgentId};
pub use store::{StatusCounts, TaskStore};
pub use task::{Task, TaskId, TaskStatus};
