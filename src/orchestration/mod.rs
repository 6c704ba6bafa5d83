//! Orchestration layer: agent pool, assignment, and the execution driver.
//!
//! This module coordinates a run: the pool tracks agent slots, the
//! assignment policy picks an agent for each ready task, executors do
//! the actual work, and the driver loops dispatch-and-collect until the
//! task graph is done or stuck.

pub mod assign;
pub mod driver;
pub mod executor;
pub mod pool;

pub use assign::{match_agent, uncovered_tasks};
pub use driver::{DriverConfig, DriverEvent, ExecutionDriver};
pub use executor::{ExecOutcome, InstantExecutor, SimulatedExecutor, TaskExecutor};
pub use pool::AgentPool;
