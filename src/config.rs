use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::Agent;
use crate::error::{Error, Result};
use crate::stlog_debug;

fn default_max_agents() -> usize {
    3
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_simulate_delay_ms() -> u64 {
    25
}

fn default_branch_prefix() -> String {
    "stampede".to_string()
}

fn default_agent_slots() -> usize {
    1
}

/// An agent roster entry from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default = "default_agent_slots")]
    pub max_concurrent: usize,
}

impl AgentConfig {
    pub fn to_agent(&self) -> Agent {
        let name = self.name.clone().unwrap_or_else(|| self.id.clone());
        let mut agent = Agent::new(self.id.as_str(), &name);
        agent.capabilities = self.capabilities.clone();
        agent.max_concurrent = self.max_concurrent;
        agent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of generalist agents when no roster is configured.
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    /// Upper bound on driver iterations per run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    /// Per-task wall-clock limit in seconds; absent means no limit.
    pub task_timeout_secs: Option<u64>,
    /// Base delay per estimated minute for the simulated executor.
    #[serde(default = "default_simulate_delay_ms")]
    pub simulate_delay_ms: u64,
    /// Prefix for run branches created with `--snapshot`.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    /// Optional agent roster; overrides `max_agents` when non-empty.
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_agents: default_max_agents(),
            max_iterations: default_max_iterations(),
            task_timeout_secs: None,
            simulate_delay_ms: default_simulate_delay_ms(),
            branch_prefix: default_branch_prefix(),
            agents: Vec::new(),
        }
    }
}

impl Config {
    pub fn stampede_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".stampede"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::stampede_dir()?.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        stlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            stlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(&path)?)?;
        stlog_debug!(
            "Config loaded: max_agents={}, max_iterations={}, roster={}",
            config.max_agents,
            config.max_iterations,
            config.agents.len()
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::stampede_dir()?;
        stlog_debug!("Config::save dir={}", dir.display());
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        stlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn simulate_delay(&self) -> Duration {
        Duration::from_millis(self.simulate_delay_ms)
    }

    /// Build the agent roster for a run: the configured agents when a
    /// roster is present, otherwise `count` single-slot generalists.
    pub fn build_roster(&self, count: usize) -> Vec<Agent> {
        if !self.agents.is_empty() {
            return self.agents.iter().map(AgentConfig::to_agent).collect();
        }
        (1..=count)
            .map(|i| Agent::new(format!("agent-{}", i), &format!("agent {}", i)))
            .collect()
    }
}
