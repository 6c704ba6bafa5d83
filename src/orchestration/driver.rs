//! Execution driver for the task graph.
//!
//! The driver owns the task store and the agent pool for the duration
//! of a run. Each iteration dispatches every ready task that an
//! available agent can take, then collects finished outcomes; the run
//! ends when all tasks complete, when no progress is possible, or when
//! the iteration limit is hit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentId, TaskId, TaskStatus, TaskStore};
use crate::error::{Error, Result};
use crate::orchestration::assign::match_agent;
use crate::orchestration::executor::{ExecOutcome, TaskExecutor};
use crate::orchestration::pool::AgentPool;
use crate::session::{ExecutionSession, RunOutcome, RunSummary};
use crate::{stlog, stlog_debug, stlog_warn};

/// Buffer for the per-run outcome channel. Workers block on send once
/// it fills, which only throttles them, never loses an outcome.
const OUTCOME_BUFFER: usize = 64;

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Upper bound on dispatch-and-collect iterations.
    pub max_iterations: u64,
    /// Per-task wall-clock limit; a task over it is recorded as failed.
    pub task_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            task_timeout: None,
        }
    }
}

/// Events emitted during a run for task lifecycle changes.
///
/// Emission is optional and best-effort; the driver never blocks a run
/// on a missing subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A task was assigned to an agent and handed to the executor.
    TaskStarted { task: TaskId, agent: AgentId },
    /// A task's executor reported success.
    TaskCompleted { task: TaskId },
    /// A task's executor reported failure, or it timed out.
    TaskFailed { task: TaskId, reason: String },
    /// No task could be dispatched and none is in flight. Carries the
    /// ids still ready (no agent would take them) and still blocked.
    Stalled {
        ready: Vec<TaskId>,
        blocked: Vec<TaskId>,
    },
    /// The run is over.
    Finished { outcome: RunOutcome },
}

/// Outcome message sent back by a worker when its task finishes.
struct TaskDone {
    task: TaskId,
    agent: AgentId,
    outcome: ExecOutcome,
}

/// Drives a task store to completion against an agent pool.
///
/// The driver is the single writer for both the store and the pool;
/// workers only execute and report back over a channel, so no state is
/// shared or locked.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use stampede::{AgentPool, ExecutionDriver, InstantExecutor, TaskStore};
///
/// let mut driver = ExecutionDriver::new(store, pool, Arc::new(InstantExecutor::new()));
/// let summary = driver.run().await?;
/// println!("{}", summary.render());
/// ```
pub struct ExecutionDriver {
    /// Task graph and statuses, owned for the run.
    store: TaskStore,
    /// Agent roster and slot counts, owned for the run.
    pool: AgentPool,
    /// Executes individual tasks; shared with spawned workers.
    executor: Arc<dyn TaskExecutor>,
    config: DriverConfig,
    /// Optional subscriber for lifecycle events.
    events: Option<mpsc::Sender<DriverEvent>>,
    /// Root token; cancelling it aborts every in-flight worker.
    cancel: CancellationToken,
    /// Tasks currently handed to workers, with their agents.
    in_flight: HashMap<TaskId, AgentId>,
}

impl ExecutionDriver {
    pub fn new(store: TaskStore, pool: AgentPool, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            store,
            pool,
            executor,
            config: DriverConfig::default(),
            events: None,
            cancel: CancellationToken::new(),
            in_flight: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<DriverEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn pool(&self) -> &AgentPool {
        &self.pool
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Run the dispatch-and-collect loop until the store is done or no
    /// further progress is possible.
    ///
    /// Each iteration:
    /// 1. dispatches every ready task an available agent can take,
    /// 2. stalls out if nothing was dispatched and nothing is in flight,
    /// 3. otherwise waits for at least one outcome and applies all that
    ///    have arrived.
    ///
    /// Hitting the iteration limit cancels in-flight workers and waits
    /// for their outcomes so the summary reflects every task.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut session = ExecutionSession::start();
        stlog!(
            "run {} starting: {} tasks, {} agents",
            session.id.short(),
            self.store.len(),
            self.pool.len()
        );

        let (done_tx, mut done_rx) = mpsc::channel::<TaskDone>(OUTCOME_BUFFER);

        let outcome = loop {
            if self.store.all_completed() {
                break RunOutcome::Completed;
            }

            if session.iterations >= self.config.max_iterations {
                stlog_warn!(
                    "run {} hit iteration limit ({})",
                    session.id.short(),
                    self.config.max_iterations
                );
                self.cancel.cancel();
                self.drain_in_flight(&mut done_rx).await?;
                break RunOutcome::IterationLimit;
            }
            session.iterations += 1;

            let dispatched = self.dispatch_ready(&done_tx).await?;

            if dispatched == 0 && self.in_flight.is_empty() {
                let ready = self.store.ready_task_ids();
                let blocked: Vec<TaskId> = self
                    .store
                    .blocked_tasks()
                    .into_iter()
                    .map(|(t, _)| t.id.clone())
                    .collect();
                stlog_warn!(
                    "run {} stalled: {} ready without an agent, {} blocked",
                    session.id.short(),
                    ready.len(),
                    blocked.len()
                );
                self.emit(DriverEvent::Stalled { ready, blocked }).await;
                break RunOutcome::Stalled;
            }

            // Wait for one outcome, then absorb everything else that
            // has already arrived.
            if let Some(done) = done_rx.recv().await {
                self.apply_outcome(done).await?;
            }
            while let Ok(done) = done_rx.try_recv() {
                self.apply_outcome(done).await?;
            }
        };

        session.finish();
        self.emit(DriverEvent::Finished { outcome }).await;

        let summary = RunSummary::from_store(&self.store, &session, outcome);
        stlog!(
            "run {} finished: {} ({}/{} completed in {} iterations)",
            session.id.short(),
            outcome,
            summary.counts.completed,
            summary.total,
            summary.iterations
        );
        Ok(summary)
    }

    /// Dispatch ready tasks to available agents, in scheduling order.
    ///
    /// Stops early once no agent has a free slot. A ready task no agent
    /// can take (capability mismatch) is skipped, not an error.
    /// Returns the number of tasks handed to workers.
    async fn dispatch_ready(&mut self, done_tx: &mpsc::Sender<TaskDone>) -> Result<usize> {
        let mut dispatched = 0;

        for task_id in self.store.ready_task_ids() {
            if !self.pool.has_available() {
                break;
            }

            let task = self.store.get(&task_id)?;
            let Some(agent) = match_agent(task, self.pool.available_agents()) else {
                continue;
            };
            let agent_id = agent.id.clone();

            // Contention on a slot is expected, not a run failure: leave
            // the task ready and let the next pass retry it.
            match self.pool.assign(&agent_id, &task_id) {
                Ok(()) => {}
                Err(Error::CapacityExceeded { .. }) => continue,
                Err(e) => return Err(e),
            }
            self.store.set_status(&task_id, TaskStatus::InProgress)?;
            self.store.record_assignment(&task_id, agent_id.clone())?;
            self.in_flight.insert(task_id.clone(), agent_id.clone());

            let task = self.store.get(&task_id)?.clone();
            let executor = Arc::clone(&self.executor);
            let token = self.cancel.child_token();
            let done = done_tx.clone();
            let limit = self.config.task_timeout;
            let agent = agent_id.clone();
            let id = task_id.clone();

            let exec_token = token.clone();
            let worker = tokio::spawn(async move {
                match limit {
                    Some(dur) => {
                        match tokio::time::timeout(dur, executor.execute(&task, exec_token)).await {
                            Ok(outcome) => outcome,
                            Err(_) => ExecOutcome::failure(format!("timed out after {:?}", dur)),
                        }
                    }
                    None => executor.execute(&task, exec_token).await,
                }
            });

            // Every dispatch must produce exactly one outcome message,
            // even if the executor panics: join the worker and map a
            // failed join to a failure.
            let abort = worker.abort_handle();
            tokio::spawn(async move {
                let outcome = tokio::select! {
                    _ = token.cancelled() => {
                        abort.abort();
                        ExecOutcome::failure("cancelled")
                    }
                    joined = worker => match joined {
                        Ok(outcome) => outcome,
                        Err(_) => ExecOutcome::failure("executor panicked"),
                    },
                };
                let _ = done.send(TaskDone { task: id, agent, outcome }).await;
            });

            self.emit(DriverEvent::TaskStarted {
                task: task_id,
                agent: agent_id,
            })
            .await;
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Record a finished task: free the agent slot and apply the
    /// terminal status. Unknown tasks are ignored.
    async fn apply_outcome(&mut self, done: TaskDone) -> Result<()> {
        let TaskDone {
            task,
            agent,
            outcome,
        } = done;

        if self.in_flight.remove(&task).is_none() {
            return Ok(());
        }
        self.pool.release(&agent);

        match outcome {
            ExecOutcome::Success => {
                self.store.set_status(&task, TaskStatus::Completed)?;
                stlog_debug!("task {} completed", task);
                self.emit(DriverEvent::TaskCompleted { task }).await;
            }
            ExecOutcome::Failure { reason } => {
                self.store.set_status(
                    &task,
                    TaskStatus::Failed {
                        reason: reason.clone(),
                    },
                )?;
                stlog_warn!("task {} failed: {}", task, reason);
                self.emit(DriverEvent::TaskFailed { task, reason }).await;
            }
        }
        Ok(())
    }

    /// Absorb outcomes for every in-flight worker. Called after the
    /// root token is cancelled, so each worker reports promptly.
    async fn drain_in_flight(&mut self, done_rx: &mut mpsc::Receiver<TaskDone>) -> Result<()> {
        while !self.in_flight.is_empty() {
            match done_rx.recv().await {
                Some(done) => self.apply_outcome(done).await?,
                None => break,
            }
        }
        Ok(())
    }

    async fn emit(&self, event: DriverEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
