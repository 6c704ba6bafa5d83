use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use stampede::config::Config;
use stampede::orchestration::{
    uncovered_tasks, AgentPool, DriverConfig, DriverEvent, ExecutionDriver, InstantExecutor,
    SimulatedExecutor, TaskExecutor,
};
use stampede::plan::{build_store, load_plan, plan_waves};
use stampede::snapshot::RepoSnapshot;
use stampede::{stlog, Result, TaskId, TaskStatus, TaskStore};

/// Stampede - dependency-aware task execution across a bounded agent pool
#[derive(Parser, Debug)]
#[command(name = "stampede")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    STAMPEDE_DEBUG=1     Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.stampede/stampede.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Analyze a plan's dependency structure without executing it
    Analyze {
        /// Path to the checklist plan file
        plan: PathBuf,
    },

    /// Execute a plan across the agent pool
    Run(RunArgs),

    /// Report per-status counts and the ready/blocked breakdown
    Status {
        /// Path to the checklist plan file
        plan: PathBuf,
    },

    /// Show full detail for one task
    Show {
        /// Path to the checklist plan file
        plan: PathBuf,

        /// Task id as written in the plan
        task_id: String,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct RunArgs {
    /// Path to the checklist plan file
    pub plan: PathBuf,

    /// Print the wave schedule without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Simulate execution with a per-task delay instead of instant completion
    #[arg(long)]
    pub simulate: bool,

    /// Simulated per-task delay in milliseconds (implies --simulate)
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Force these task ids to fail, for rehearsing failure paths
    #[arg(long, value_name = "TASK_ID")]
    pub fail: Vec<String>,

    /// Number of uniform agents (overrides the configured roster)
    #[arg(long, value_name = "N")]
    pub agents: Option<usize>,

    /// Per-task timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Upper bound on driver iterations
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u64>,

    /// Write the run summary as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Record the git branch/commit and create a run branch
    #[arg(long)]
    pub snapshot: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stampede::log::init_with_debug(cli.debug);

    match cli.command {
        Command::Analyze { plan } => run_analyze(plan),
        Command::Run(args) => run_execute(args),
        Command::Status { plan } => run_status(plan),
        Command::Show { plan, task_id } => run_show(plan, task_id),
    }
}

/// Load a plan and exit with code 1 if it holds no tasks.
fn load_store(plan_path: &PathBuf) -> Result<TaskStore> {
    let tasks = load_plan(plan_path)?;
    if tasks.is_empty() {
        println!("no tasks found in {}", plan_path.display());
        std::process::exit(1);
    }
    build_store(tasks)
}

/// Analyze dependencies: totals, tiers, roots, the wave schedule, cycle
/// detection, and capability demand against the configured roster.
fn run_analyze(plan_path: PathBuf) -> Result<()> {
    stlog!("analyze command: plan={}", plan_path.display());

    let store = load_store(&plan_path)?;
    let config = Config::load()?;
    let pool = AgentPool::from_agents(config.build_roster(config.max_agents))?;

    println!("plan: {}", plan_path.display());
    println!(
        "  {} tasks, {} dependency edges",
        store.len(),
        store.dependency_count()
    );

    let counts = store.status_counts();
    if counts.completed > 0 {
        println!(
            "  {} already checked off, {} pending",
            counts.completed, counts.not_started
        );
    }

    let mut tiers: BTreeMap<u32, usize> = BTreeMap::new();
    for task in store.all_tasks() {
        *tiers.entry(task.tier).or_default() += 1;
    }
    if tiers.len() > 1 {
        let parts: Vec<String> = tiers
            .iter()
            .map(|(tier, n)| format!("tier {tier}: {n}"))
            .collect();
        println!("  {}", parts.join(", "));
    }

    let roots: Vec<TaskId> = store
        .all_tasks()
        .into_iter()
        .filter(|t| t.depends_on.is_empty())
        .map(|t| t.id.clone())
        .collect();
    println!("  roots: {}", format_ids(&roots));

    let waves = plan_waves(&store)?;
    println!();
    println!("wave schedule ({} waves):", waves.wave_count());
    for (i, wave) in waves.waves.iter().enumerate() {
        println!("  {}: {}", i + 1, format_ids(wave));
    }

    let cycles = store.detect_cycles();
    if !cycles.is_empty() {
        println!();
        println!("\x1b[31mdependency cycles (these tasks can never run):\x1b[0m");
        for cycle in &cycles {
            println!("  {}", format_ids(cycle));
        }
    }

    let uncovered = uncovered_tasks(&store, &pool);
    if !uncovered.is_empty() {
        println!();
        println!("\x1b[33mno registered agent covers:\x1b[0m");
        for id in &uncovered {
            let task = store.get(id)?;
            println!(
                "  {} {} (needs: {})",
                task.id,
                task.name,
                task.capabilities.join(", ")
            );
        }
        println!("  roster offers: {}", pool.offered_capabilities().join(", "));
    }

    if !cycles.is_empty() || !uncovered.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

/// Execute a plan, or print its wave schedule with --dry-run.
fn run_execute(args: RunArgs) -> Result<()> {
    stlog!(
        "run command: plan={}, dry_run={}, simulate={}, agents={:?}",
        args.plan.display(),
        args.dry_run,
        args.simulate,
        args.agents
    );

    let store = load_store(&args.plan)?;

    if args.dry_run {
        return print_dry_run(&store);
    }

    let config = Config::load()?;
    let agent_count = args.agents.unwrap_or(config.max_agents);
    let pool = AgentPool::from_agents(config.build_roster(agent_count))?;

    let driver_config = DriverConfig {
        max_iterations: args.max_iterations.unwrap_or(config.max_iterations),
        task_timeout: args
            .timeout_secs
            .map(Duration::from_secs)
            .or_else(|| config.task_timeout()),
    };

    let fail: Vec<&str> = args.fail.iter().map(String::as_str).collect();
    let executor: Arc<dyn TaskExecutor> = if args.simulate || args.delay_ms.is_some() {
        let delay = args
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.simulate_delay());
        Arc::new(SimulatedExecutor::new(delay).fail_on(&fail))
    } else {
        Arc::new(InstantExecutor::new().fail_on(&fail))
    };

    // Capture repository state before anything runs; the run branch is
    // created afterwards, once the run id is known.
    let repo = if args.snapshot {
        Some(RepoSnapshot::discover(&std::env::current_dir()?)?)
    } else {
        None
    };
    let snapshot_info = match &repo {
        Some(repo) => Some(repo.capture()?),
        None => None,
    };

    println!(
        "executing {} tasks across {} agents",
        store.len(),
        pool.len()
    );

    let rt = tokio::runtime::Runtime::new()?;
    let mut summary = rt.block_on(async {
        let (tx, mut rx) = tokio::sync::mpsc::channel(64);
        let printer = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    DriverEvent::TaskStarted { task, agent } => {
                        println!("  \x1b[90m→\x1b[0m {task} ({agent})");
                    }
                    DriverEvent::TaskCompleted { task } => {
                        println!("  \x1b[32m✓\x1b[0m {task}");
                    }
                    DriverEvent::TaskFailed { task, reason } => {
                        println!("  \x1b[31m✗\x1b[0m {task}: {reason}");
                    }
                    DriverEvent::Stalled { ready, blocked } => {
                        if !ready.is_empty() || !blocked.is_empty() {
                            println!(
                                "  \x1b[33mstalled\x1b[0m {} ready without an agent, {} blocked",
                                ready.len(),
                                blocked.len()
                            );
                        }
                    }
                    DriverEvent::Finished { .. } => {}
                }
            }
        });

        let mut driver = ExecutionDriver::new(store, pool, executor)
            .with_config(driver_config)
            .with_events(tx);
        let result = driver.run().await;
        drop(driver);
        let _ = printer.await;
        result
    })?;

    if let Some(repo) = &repo {
        let branch = format!("{}/run-{}", config.branch_prefix, summary.run_id.short());
        repo.create_run_branch(&branch)?;
        stlog!("created run branch {}", branch);
        println!("run branch: {branch}");
    }
    if let Some(info) = snapshot_info {
        summary = summary.with_snapshot(info);
    }

    println!();
    println!("{}", summary.render());

    if let Some(path) = &args.json {
        std::fs::write(path, summary.to_json()?)?;
        println!("wrote summary to {}", path.display());
    }

    if !summary.is_complete() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print the wave schedule a run would follow.
fn print_dry_run(store: &TaskStore) -> Result<()> {
    let plan = plan_waves(store)?;
    println!(
        "wave schedule ({} waves, {} tasks):",
        plan.wave_count(),
        plan.scheduled()
    );
    for (i, wave) in plan.waves.iter().enumerate() {
        println!("  wave {}: {}", i + 1, format_ids(wave));
    }
    if !plan.leftover.is_empty() {
        println!("\x1b[31mnever runnable:\x1b[0m {}", format_ids(&plan.leftover));
        std::process::exit(1);
    }
    Ok(())
}

/// Report checklist state: counts plus the ready and blocked breakdown.
fn run_status(plan_path: PathBuf) -> Result<()> {
    stlog!("status command: plan={}", plan_path.display());

    let store = load_store(&plan_path)?;
    let counts = store.status_counts();
    let total = counts.total();
    let percent = if total == 0 {
        100.0
    } else {
        counts.completed as f64 / total as f64 * 100.0
    };

    println!("plan: {}", plan_path.display());
    println!("  {}/{} completed ({:.1}%)", counts.completed, total, percent);
    println!("  in progress: {}", counts.in_progress);
    println!("  not started: {}", counts.not_started);
    println!("  failed:      {}", counts.failed);

    let ready = store.ready_tasks();
    if !ready.is_empty() {
        println!();
        println!("ready to run:");
        for task in ready {
            println!("  {} {}", task.id, task.name);
        }
    }

    let blocked = store.blocked_tasks();
    if !blocked.is_empty() {
        println!();
        println!("blocked:");
        for (task, missing) in blocked {
            println!(
                "  {} {} (waiting on: {})",
                task.id,
                task.name,
                format_ids(&missing)
            );
        }
    }
    Ok(())
}

/// Show one task in full: metadata, dependencies, and dependents.
fn run_show(plan_path: PathBuf, task_id: String) -> Result<()> {
    stlog!("show command: plan={}, task={}", plan_path.display(), task_id);

    let store = load_store(&plan_path)?;
    let id = TaskId::from(task_id);
    let task = store.get(&id)?;

    println!("{} {}", task.id, task.name);
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!("  status: {}", format_status(&task.status));
    println!("  tier:   {}", task.tier);
    if let Some(minutes) = task.estimate_min {
        println!("  estimate: {minutes} min");
    }
    if !task.capabilities.is_empty() {
        println!("  capabilities: {}", task.capabilities.join(", "));
    }
    if !task.requirement_refs.is_empty() {
        println!("  requirements: {}", task.requirement_refs.join(", "));
    }

    let deps = store.dependencies_of(&id);
    if !deps.is_empty() {
        println!("  depends on:");
        for dep in deps {
            println!("    {} {} [{}]", dep.id, dep.name, format_status(&dep.status));
        }
    }
    let dependents = store.dependents_of(&id);
    if !dependents.is_empty() {
        println!("  unblocks:");
        for dep in dependents {
            println!("    {} {}", dep.id, dep.name);
        }
    }
    Ok(())
}

/// Render task ids comma-separated.
fn format_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format a task status with color codes for terminal.
fn format_status(status: &TaskStatus) -> String {
    match status {
        TaskStatus::Completed => format!("\x1b[32m{}\x1b[0m", status.name()), // Green
        TaskStatus::InProgress => format!("\x1b[33m{}\x1b[0m", status.name()), // Yellow
        TaskStatus::NotStarted => format!("\x1b[90m{}\x1b[0m", status.name()), // Gray
        TaskStatus::Failed { reason } => {
            format!("\x1b[31m{} ({reason})\x1b[0m", status.name()) // Red
        }
    }
}
