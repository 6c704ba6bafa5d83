pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod plan;
pub mod session;
pub mod snapshot;

pub use crate::core::{Agent, AgentId, StatusCounts, Task, TaskId, TaskStatus, TaskStore};
pub use error::{Error, Result};
pub use orchestration::{
    match_agent, uncovered_tasks, AgentPool, DriverConfig, DriverEvent, ExecOutcome,
    ExecutionDriver, InstantExecutor, SimulatedExecutor, TaskExecutor,
};
pub use plan::{build_store, load_plan, parse_plan, plan_waves, WavePlan};
pub use session::{ExecutionSession, RunId, RunOutcome, RunSummary};
pub use snapshot::{RepoSnapshot, SnapshotInfo};
