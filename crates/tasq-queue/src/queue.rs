//! Thread-safe task mailbox.
//!
//! The pending set, the result table, the id counter and the lifecycle flags
//! all live behind a single mutex. Every mutation and its wake-up happen in
//! the same critical section:
//!
//! - `work_ready` parks the worker while the pending set is empty,
//! - `results_ready` is broadcast on every publication and on worker detach,
//! - `published` is a `tokio::sync::watch` counter bumped after the same events
//!   so async callers can wait without blocking a runtime thread.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::TaskQueueError;
use crate::model::{Task, TaskId, TaskKind, TaskOutcome, TaskResult};

/// Configuration for the task queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of tasks waiting in the pending set (0 = unlimited)
    pub max_pending: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_pending: 0 }
    }
}

/// Point-in-time snapshot of queue occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub executing: Option<TaskId>,
    /// Results published, failures and abandoned tasks included
    pub completed: u64,
    pub failed: u64,
    pub abandoned: u64,
    /// Highest id handed out so far (`0` before the first enqueue)
    pub last_issued: u64,
    pub accepting: bool,
    pub worker_attached: bool,
}

struct QueueState {
    pending: VecDeque<Task>,
    results: HashMap<TaskId, TaskResult>,
    /// Last id handed out; the next task receives `last_issued + 1`.
    last_issued: u64,
    executing: Option<TaskId>,
    /// Completion sequence of the most recent publication.
    sequence: u64,
    failed: u64,
    abandoned: u64,
    /// Cleared by `close()`; enqueue refuses work while unset.
    accepting: bool,
    /// Stop signal observed by `dequeue()`.
    closed: bool,
    worker_attached: bool,
}

impl QueueState {
    fn lookup(&self, id: TaskId) -> Result<Option<TaskResult>, TaskQueueError> {
        if let Some(result) = self.results.get(&id) {
            return Ok(Some(result.clone()));
        }
        if !self.worker_attached {
            return Err(TaskQueueError::WorkerStopped(id));
        }
        Ok(None)
    }

    fn insert_result(&mut self, id: TaskId, outcome: TaskOutcome) -> u64 {
        self.sequence += 1;
        match &outcome {
            TaskOutcome::Failed(_) => self.failed += 1,
            TaskOutcome::Abandoned => self.abandoned += 1,
            TaskOutcome::Value(_) => {}
        }
        let sequence = self.sequence;
        self.results.insert(
            id,
            TaskResult {
                id,
                outcome,
                sequence,
                completed_at: Utc::now(),
            },
        );
        sequence
    }
}

/// Mailbox handing tasks from many producers to one consumer and results
/// back to many waiters.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    work_ready: Condvar,
    results_ready: Condvar,
    published: watch::Sender<u64>,
    config: QueueConfig,
}

impl TaskQueue {
    /// Create a new queue with default configuration.
    ///
    /// The queue starts closed with no worker attached; `open()` and
    /// `attach_worker()` are called by the owner when its worker starts.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a new queue with custom configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        let (published, _) = watch::channel(0);
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                results: HashMap::new(),
                last_issued: 0,
                executing: None,
                sequence: 0,
                failed: 0,
                abandoned: 0,
                accepting: false,
                closed: true,
                worker_attached: false,
            }),
            work_ready: Condvar::new(),
            results_ready: Condvar::new(),
            published,
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    // === Producer side ===

    /// Allocate the next id and append a task to the pending set.
    ///
    /// Never blocks beyond acquiring the queue mutex. Wakes the worker.
    pub fn enqueue(&self, kind: TaskKind, operands: Vec<f64>) -> Result<TaskId, TaskQueueError> {
        let mut state = self.state.lock();

        if !state.accepting {
            return Err(TaskQueueError::Closed);
        }
        if self.config.max_pending > 0 && state.pending.len() >= self.config.max_pending {
            return Err(TaskQueueError::QueueFull(self.config.max_pending));
        }

        state.last_issued += 1;
        let id = TaskId::new(state.last_issued);
        trace!(task_id = %id, kind = %kind, "Enqueued task");
        state.pending.push_back(Task {
            id,
            kind,
            operands,
            submitted_at: Utc::now(),
        });
        self.work_ready.notify_one();

        Ok(id)
    }

    // === Worker side ===

    /// Remove and return the head of the pending set.
    ///
    /// Suspends while the set is empty and the queue is open. Returns `None`
    /// only once the queue has been closed and nothing is left to run.
    pub fn dequeue(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.pending.pop_front() {
                state.executing = Some(task.id);
                return Some(task);
            }
            if state.closed {
                return None;
            }
            self.work_ready.wait(&mut state);
        }
    }

    /// Publish the outcome of a task and wake every waiter.
    ///
    /// Only the task handed out by the last `dequeue()` can be published;
    /// a task still in the pending set is rejected with `NotExecuting`.
    pub fn publish_result(&self, id: TaskId, outcome: TaskOutcome) -> Result<(), TaskQueueError> {
        {
            let mut state = self.state.lock();

            if !id.is_valid() || id.get() > state.last_issued {
                return Err(TaskQueueError::UnknownTask(id));
            }
            if state.results.contains_key(&id) {
                return Err(TaskQueueError::AlreadyPublished(id));
            }
            if state.executing != Some(id) {
                return Err(TaskQueueError::NotExecuting(id));
            }
            state.executing = None;

            let sequence = state.insert_result(id, outcome);
            trace!(task_id = %id, sequence, "Published result");
            self.results_ready.notify_all();
        }
        self.bump_published();
        Ok(())
    }

    // === Waiter side ===

    /// Non-blocking lookup of a published result.
    pub fn try_result(&self, id: TaskId) -> Option<TaskResult> {
        self.state.lock().results.get(&id).cloned()
    }

    /// Block until the result for `id` is published.
    ///
    /// Returns immediately if it already is. Fails with `WorkerStopped` when
    /// no worker is attached to produce it.
    pub fn await_result(&self, id: TaskId) -> Result<TaskResult, TaskQueueError> {
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.lookup(id)? {
                return Ok(result);
            }
            self.results_ready.wait(&mut state);
        }
    }

    /// Bounded variant of [`await_result`](Self::await_result).
    ///
    /// On timeout the task stays in the system; a later call may still
    /// observe its result. A timeout too large to express as a deadline
    /// (e.g. `Duration::MAX`) waits without bound.
    pub fn await_result_timeout(
        &self,
        id: TaskId,
        timeout: Duration,
    ) -> Result<TaskResult, TaskQueueError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.await_result(id);
        };
        let mut state = self.state.lock();
        loop {
            if let Some(result) = state.lookup(id)? {
                return Ok(result);
            }
            if self
                .results_ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return match state.lookup(id)? {
                    Some(result) => Ok(result),
                    None => Err(TaskQueueError::Timeout {
                        id,
                        waited: timeout,
                    }),
                };
            }
        }
    }

    /// Async variant of [`await_result`](Self::await_result).
    ///
    /// Subscribes to the publication counter before checking the table, so a
    /// publication racing with the check is still observed.
    pub async fn await_result_async(&self, id: TaskId) -> Result<TaskResult, TaskQueueError> {
        let mut rx = self.published.subscribe();
        loop {
            let found = self.state.lock().lookup(id)?;
            if let Some(result) = found {
                return Ok(result);
            }
            if rx.changed().await.is_err() {
                return Err(TaskQueueError::WorkerStopped(id));
            }
        }
    }

    // === Lifecycle hooks ===

    /// Accept new work and clear any previous stop signal.
    pub fn open(&self) {
        let mut state = self.state.lock();
        state.accepting = true;
        state.closed = false;
    }

    /// Raise the stop signal: refuse new work and let `dequeue()` return
    /// `None` once the pending set is empty.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.accepting = false;
        state.closed = true;
        self.work_ready.notify_all();
        debug!(pending = state.pending.len(), "Queue closed");
    }

    /// Remove every pending task and publish [`TaskOutcome::Abandoned`] for
    /// each. The task currently executing is unaffected. Returns the ids.
    pub fn abandon_pending(&self) -> Vec<TaskId> {
        let abandoned = {
            let mut state = self.state.lock();
            self.abandon_locked(&mut state)
        };
        if !abandoned.is_empty() {
            self.bump_published();
        }
        abandoned
    }

    /// Raise the stop signal and abandon every pending task in one critical
    /// section, so the worker cannot pick up another task in between.
    pub fn close_and_abandon(&self) -> Vec<TaskId> {
        let abandoned = {
            let mut state = self.state.lock();
            state.accepting = false;
            state.closed = true;
            let ids = self.abandon_locked(&mut state);
            self.work_ready.notify_all();
            debug!(abandoned = ids.len(), "Queue closed, pending tasks abandoned");
            ids
        };
        if !abandoned.is_empty() {
            self.bump_published();
        }
        abandoned
    }

    fn abandon_locked(&self, state: &mut QueueState) -> Vec<TaskId> {
        let ids: Vec<TaskId> = state.pending.drain(..).map(|t| t.id).collect();
        for id in &ids {
            state.insert_result(*id, TaskOutcome::Abandoned);
        }
        if !ids.is_empty() {
            self.results_ready.notify_all();
        }
        ids
    }

    /// Record that a worker is consuming this queue.
    pub fn attach_worker(&self) {
        self.state.lock().worker_attached = true;
    }

    /// Record that the worker has exited and release every waiter whose
    /// result can no longer arrive.
    pub fn detach_worker(&self) {
        {
            let mut state = self.state.lock();
            state.worker_attached = false;
            state.executing = None;
            self.results_ready.notify_all();
        }
        self.bump_published();
    }

    // === Introspection ===

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            pending: state.pending.len(),
            executing: state.executing,
            completed: state.results.len() as u64,
            failed: state.failed,
            abandoned: state.abandoned,
            last_issued: state.last_issued,
            accepting: state.accepting,
            worker_attached: state.worker_attached,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn bump_published(&self) {
        self.published.send_modify(|v| *v = v.wrapping_add(1));
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
