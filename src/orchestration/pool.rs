//! Agent pool with capacity bookkeeping.
//!
//! The pool owns all agent records for one run. Agents are registered
//! once at session start; after that the only mutations are the
//! assign/release counts. Registration order is preserved because the
//! assignment policy matches agents in that order.

use crate::core::agent::{Agent, AgentId};
use crate::core::task::TaskId;
use crate::error::{Error, Result};
use crate::stlog_debug;
use std::collections::{BTreeSet, HashMap};

/// Owns the agents for one execution session.
pub struct AgentPool {
    /// Agent records indexed by id.
    agents: HashMap<AgentId, Agent>,
    /// Ids in registration order; matching iterates this.
    order: Vec<AgentId>,
}

impl AgentPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Build a pool from a list of agents, registering in list order.
    pub fn from_agents(agents: Vec<Agent>) -> Result<Self> {
        let mut pool = Self::new();
        for agent in agents {
            pool.register(agent)?;
        }
        Ok(pool)
    }

    /// Register an agent.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateAgent`] if the id is already present.
    pub fn register(&mut self, agent: Agent) -> Result<()> {
        if self.agents.contains_key(&agent.id) {
            return Err(Error::DuplicateAgent { id: agent.id });
        }
        self.order.push(agent.id.clone());
        self.agents.insert(agent.id.clone(), agent);
        Ok(())
    }

    /// Assign a task slot on an agent.
    ///
    /// # Errors
    /// [`Error::AgentNotFound`] for an unknown id;
    /// [`Error::CapacityExceeded`] when the agent has no free slot. The
    /// driver treats the latter as an expected race and skips the agent.
    pub fn assign(&mut self, id: &AgentId, task: &TaskId) -> Result<()> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| Error::AgentNotFound { id: id.clone() })?;
        if !agent.is_available() {
            return Err(Error::CapacityExceeded {
                agent: id.clone(),
                max: agent.max_concurrent,
            });
        }
        agent.active += 1;
        stlog_debug!(
            "assigned task {} to agent {} ({}/{} slots)",
            task,
            id,
            agent.active,
            agent.max_concurrent
        );
        Ok(())
    }

    /// Free one task slot on an agent.
    ///
    /// Silent no-op when the agent is unknown or has nothing assigned;
    /// double-release must not corrupt the counts.
    pub fn release(&mut self, id: &AgentId) {
        if let Some(agent) = self.agents.get_mut(id) {
            if agent.active > 0 {
                agent.active -= 1;
            }
        }
    }

    /// Get an agent by id.
    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// All agents in registration order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Agents with a free slot, in registration order.
    pub fn available_agents(&self) -> Vec<&Agent> {
        self.agents().filter(|a| a.is_available()).collect()
    }

    /// Whether any agent has a free slot.
    pub fn has_available(&self) -> bool {
        self.agents().any(|a| a.is_available())
    }

    /// Total currently assigned tasks across all agents.
    pub fn active_total(&self) -> usize {
        self.agents().map(|a| a.active).sum()
    }

    /// Union of capability tags offered by the roster, sorted.
    pub fn offered_capabilities(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .agents()
            .flat_map(|a| a.capabilities.iter().cloned())
            .collect();
        set.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for AgentPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AgentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPool")
            .field("agents", &self.len())
            .field("active", &self.active_total())
            .finish()
    }
}
