use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Task not found: {id}")]
    TaskNotFound { id: crate::core::TaskId },

    #[error("Duplicate task id: {id}")]
    DuplicateTask { id: crate::core::TaskId },

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        task: crate::core::TaskId,
        dependency: crate::core::TaskId,
    },

    #[error("Invalid status transition for task {task}: {from} -> {to}")]
    InvalidTransition {
        task: crate::core::TaskId,
        from: String,
        to: String,
    },

    #[error("Agent not found: {id}")]
    AgentNotFound { id: crate::core::AgentId },

    #[error("Duplicate agent id: {id}")]
    DuplicateAgent { id: crate::core::AgentId },

    #[error("Agent {agent} is at capacity (max: {max})")]
    CapacityExceeded {
        agent: crate::core::AgentId,
        max: usize,
    },

    #[error("Plan parse error at line {line}: {message}")]
    Plan { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
