//! Checklist plan parsing.
//!
//! Plans are markdown task lists in the checkbox style:
//!
//! ```text
//! # Data pipeline rollout
//!
//! - [ ] 1. Provision the warehouse schema
//!   Tables, indexes, and grants for the staging area.
//!   _Capabilities: database_
//!   _Estimate: 2h_
//! - [ ] 1.1 Backfill reference data
//!   _Dependencies: 1_
//!   _Requirements: DATA-4, DATA-7_
//! - [x] 2. Reserve the deploy window
//! ```
//!
//! `- [ ]` items load as not-started and `- [x]` items as completed. A
//! leading dotted number is the task id (`1.1` above); unnumbered items
//! get positional ids (`task-3`). Indented lines under an item form its
//! description. Annotation lines carry structured fields, with an
//! optional trailing underscore:
//!
//! - `_Dependencies:` ids of tasks that must complete first
//! - `_Requirements:` requirement references, kept for traceability only
//!   and never treated as dependency edges
//! - `_Capabilities:` tags an agent must offer to be assigned the task
//! - `_Estimate:` effort in minutes (`45`, `45m`) or hours (`2h`)
//! - `_Priority:` tier override; the default tier is the id's major
//!   number, and lower tiers are scheduled first
//!
//! Unknown annotation keys are a parse error rather than silently
//! ignored text. Headings, prose, and blank lines are skipped.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::{Task, TaskId, TaskStatus, TaskStore};
use crate::error::{Error, Result};
use crate::{stlog_debug, stlog_trace};

/// A checkbox item: `- [ ]` or `- [x]`, then the title.
static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*\[([ xX])\]\s+(.+)$").unwrap());

/// Anything that opens like a checkbox item, however malformed.
static CHECKBOX_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*-\s*\[").unwrap());

/// A dotted-number id at the start of a title, optional trailing dot.
static TASK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\.?\s+(.+)$").unwrap());

/// An `_Key: value_` annotation line (trailing underscore optional).
static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_([A-Za-z]+):\s*(.*?)_?\s*$").unwrap());

/// Estimate forms: bare minutes, `45m`, or `2h`.
static ESTIMATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\s*(m|h)?$").unwrap());

/// Parse a checklist document into tasks, in file order.
///
/// Dependency declarations are recorded on each [`Task`] but not yet
/// checked against the rest of the plan; [`build_store`] wires them and
/// surfaces dangling ids. An empty or task-free document parses to an
/// empty list.
///
/// # Errors
/// [`Error::Plan`] with a 1-based line number for malformed checkbox
/// items, unknown annotation keys, annotations outside any task item,
/// and unparseable `_Estimate:` / `_Priority:` values.
///
/// # Example
///
/// ```
/// use stampede::plan::parse_plan;
///
/// let tasks = parse_plan("- [ ] 1. Build\n- [ ] 2. Test\n  _Dependencies: 1_").unwrap();
/// assert_eq!(tasks.len(), 2);
/// assert_eq!(tasks[1].depends_on.len(), 1);
/// ```
pub fn parse_plan(content: &str) -> Result<Vec<Task>> {
    let mut tasks: Vec<Task> = Vec::new();
    let mut current: Option<Task> = None;

    for (index, line) in content.lines().enumerate() {
        let lineno = index + 1;

        if let Some(caps) = CHECKBOX_RE.captures(line) {
            if let Some(done) = current.take() {
                tasks.push(done);
            }
            let checked = caps[1].eq_ignore_ascii_case("x");
            let mut task = new_task(caps[2].trim(), tasks.len() + 1);
            if checked {
                // Loaded directly: at run time the state machine only
                // reaches Completed through InProgress.
                task.status = TaskStatus::Completed;
            }
            stlog_trace!("plan line {}: task {} ({})", lineno, task.id, task.name);
            current = Some(task);
            continue;
        }

        if CHECKBOX_PREFIX_RE.is_match(line) {
            return Err(Error::Plan {
                line: lineno,
                message: "malformed checkbox item".into(),
            });
        }

        let trimmed = line.trim();
        if let Some(caps) = ANNOTATION_RE.captures(trimmed) {
            let task = current.as_mut().ok_or_else(|| Error::Plan {
                line: lineno,
                message: format!("annotation '_{}:' outside a task item", &caps[1]),
            })?;
            apply_annotation(task, &caps[1], &caps[2], lineno)?;
            continue;
        }

        if !trimmed.is_empty() && is_indented(line) {
            if let Some(task) = current.as_mut() {
                if task.description.is_empty() {
                    task.description = trimmed.to_string();
                } else {
                    task.description.push(' ');
                    task.description.push_str(trimmed);
                }
            }
        }
    }

    if let Some(done) = current.take() {
        tasks.push(done);
    }
    Ok(tasks)
}

/// Read and parse a plan file.
///
/// # Errors
/// [`Error::Io`] if the file cannot be read, plus anything
/// [`parse_plan`] reports.
pub fn load_plan(path: &Path) -> Result<Vec<Task>> {
    let content = fs::read_to_string(path)?;
    let tasks = parse_plan(&content)?;
    stlog_debug!("loaded {} tasks from {}", tasks.len(), path.display());
    Ok(tasks)
}

/// Build a [`TaskStore`] from parsed tasks and wire their declared
/// dependencies.
///
/// Insertion happens before any edge is wired, so a task may depend on
/// one declared later in the file.
///
/// # Errors
/// [`Error::DuplicateTask`] on id collisions and
/// [`Error::UnknownDependency`] when a declaration names an id the plan
/// never defines. Cyclic declarations are accepted; the driver reports
/// them as a stall and [`plan_waves`] as leftover tasks.
pub fn build_store(tasks: Vec<Task>) -> Result<TaskStore> {
    let mut store = TaskStore::new();
    let mut edges: Vec<(TaskId, TaskId)> = Vec::new();

    for task in tasks {
        for dep in &task.depends_on {
            edges.push((task.id.clone(), dep.clone()));
        }
        store.insert(task)?;
    }
    for (task, dep) in &edges {
        store.add_dependency(task, dep)?;
    }
    Ok(store)
}

/// The deterministic wave schedule a plan would execute in, assuming
/// unlimited agents.
///
/// Each wave holds the tasks that become ready together, in scheduling
/// order (ascending tier, then id). Tasks that can never become ready
/// from the current state, cycle members and everything behind them,
/// end up in `leftover`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePlan {
    pub waves: Vec<Vec<TaskId>>,
    pub leftover: Vec<TaskId>,
}

impl WavePlan {
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    /// Total tasks placed into a wave.
    pub fn scheduled(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }

    /// True when every pending task landed in a wave.
    pub fn is_complete(&self) -> bool {
        self.leftover.is_empty()
    }
}

/// Simulate the wave schedule for a store without mutating it.
///
/// Runs the readiness rule to a fixed point on a scratch copy: every
/// ready task in a pass is marked completed together, forming one wave.
/// Tasks already completed in the source, checked off in the plan file,
/// occupy no wave but do unblock their dependents.
pub fn plan_waves(store: &TaskStore) -> Result<WavePlan> {
    let mut scratch = TaskStore::new();
    for task in store.all_tasks() {
        scratch.insert(task.clone())?;
    }
    for task in store.all_tasks() {
        for dep in store.dependencies_of(&task.id) {
            scratch.add_dependency(&task.id, &dep.id)?;
        }
    }

    let mut waves = Vec::new();
    loop {
        let ready = scratch.ready_task_ids();
        if ready.is_empty() {
            break;
        }
        for id in &ready {
            scratch.set_status(id, TaskStatus::InProgress)?;
            scratch.set_status(id, TaskStatus::Completed)?;
        }
        waves.push(ready);
    }

    let leftover: Vec<TaskId> = scratch
        .all_tasks()
        .into_iter()
        .filter(|t| t.status == TaskStatus::NotStarted)
        .map(|t| t.id.clone())
        .collect();

    Ok(WavePlan { waves, leftover })
}

// ============== Internal Helper Functions ==============

/// Build a task from a checkbox title, falling back to a positional id.
fn new_task(title: &str, ordinal: usize) -> Task {
    match TASK_ID_RE.captures(title) {
        Some(caps) => {
            let id = caps[1].to_string();
            let tier = id
                .split('.')
                .next()
                .and_then(|major| major.parse().ok())
                .unwrap_or(0);
            let mut task = Task::new(id, caps[2].trim());
            task.tier = tier;
            task
        }
        None => Task::new(format!("task-{ordinal}"), title),
    }
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

/// Comma-separated annotation values, trimmed, empties dropped.
fn split_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_annotation(task: &mut Task, key: &str, value: &str, line: usize) -> Result<()> {
    match key.to_ascii_lowercase().as_str() {
        "dependencies" => {
            for id in split_values(value) {
                let id = TaskId::from(id);
                if !task.depends_on.contains(&id) {
                    task.depends_on.push(id);
                }
            }
        }
        "requirements" => task.requirement_refs.extend(split_values(value)),
        "capabilities" => {
            for tag in split_values(value) {
                if !task.capabilities.contains(&tag) {
                    task.capabilities.push(tag);
                }
            }
        }
        "estimate" => task.estimate_min = Some(parse_estimate(value, line)?),
        "priority" => {
            task.tier = value.trim().parse().map_err(|_| Error::Plan {
                line,
                message: format!("invalid priority '{}'", value.trim()),
            })?;
        }
        _ => {
            return Err(Error::Plan {
                line,
                message: format!("unknown annotation '_{key}:'"),
            });
        }
    }
    Ok(())
}

fn parse_estimate(raw: &str, line: usize) -> Result<u32> {
    let raw = raw.trim();
    let caps = ESTIMATE_RE.captures(raw).ok_or_else(|| Error::Plan {
        line,
        message: format!("invalid estimate '{raw}' (use 45, 45m, or 2h)"),
    })?;
    let value: u32 = caps[1].parse().map_err(|_| Error::Plan {
        line,
        message: format!("estimate '{raw}' is out of range"),
    })?;
    match caps.get(2).map(|m| m.as_str()) {
        Some("h") => value.checked_mul(60).ok_or_else(|| Error::Plan {
            line,
            message: format!("estimate '{raw}' is out of range"),
        }),
        _ => Ok(value),
    }
}
