//! Agent identity and capacity model.
//!
//! Agents are worker identities registered once at session start. They
//! carry capability tags used by the assignment filter and a bounded
//! concurrent task count enforced by the pool.

use serde::{Deserialize, Serialize};

/// Unique identifier for an agent, supplied by the caller at
/// registration time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A worker identity with bounded concurrent capacity.
///
/// `active` is the number of currently assigned tasks; the pool keeps it
/// within `max_concurrent` at all times. Matching is by tag intersection:
/// a task that requires tags only runs on an agent offering at least one
/// of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: AgentId,
    /// Display name for reports.
    pub name: String,
    /// Capability tags offered by this agent.
    pub capabilities: Vec<String>,
    /// Maximum concurrently assigned tasks (commonly 1).
    pub max_concurrent: usize,
    /// Currently assigned task count.
    #[serde(default)]
    pub active: usize,
}

impl Agent {
    /// Create an agent with capacity 1 and no capability tags.
    pub fn new(id: impl Into<AgentId>, name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            capabilities: Vec::new(),
            max_concurrent: 1,
            active: 0,
        }
    }

    pub fn with_capability(mut self, tag: &str) -> Self {
        self.capabilities.push(tag.to_string());
        self
    }

    pub fn with_capabilities(mut self, tags: &[&str]) -> Self {
        self.capabilities = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Derived availability: a free concurrency slot exists.
    pub fn is_available(&self) -> bool {
        self.active < self.max_concurrent
    }

    /// Whether this agent offers the given capability tag.
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    /// Whether this agent can run a task requiring the given tags.
    ///
    /// A task with no required tags matches every agent; otherwise one
    /// overlapping tag suffices.
    pub fn can_run(&self, required: &[String]) -> bool {
        required.is_empty() || required.iter().any(|tag| self.has_capability(tag))
    }
}
