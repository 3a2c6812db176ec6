//! Task server lifecycle and the client-facing submit/await API.
//!
//! `TaskServer` owns one worker thread and the [`TaskQueue`] it consumes.
//! Producers call [`submit`](TaskServer::submit) from any thread and later
//! [`await_result`](TaskServer::await_result) with the returned id.

use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use tasq_queue::{QueueStats, TaskId, TaskKind, TaskOutcome, TaskQueue, TaskResult};

use crate::config::{DrainPolicy, ServerConfig};
use crate::error::{ServerResult, TaskServerError};
use crate::evaluator::{EvalError, Evaluator, NumericEvaluator};
use crate::state_machine::{self, ServerState};
use crate::worker::Worker;

struct Lifecycle {
    state: ServerState,
    worker: Option<JoinHandle<()>>,
}

/// Snapshot of server state and queue occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    pub state: ServerState,
    pub evaluator: String,
    pub queue: QueueStats,
}

/// In-process task server with a single worker thread.
///
/// ```text
/// Stopped --start()--> Running --stop()--> Stopping --(worker exits)--> Stopped
/// ```
///
/// Results stay available for the lifetime of the server, so `await_result`
/// keeps working after `stop()` for every task the worker completed. Dropping
/// the server stops it.
pub struct TaskServer {
    queue: Arc<TaskQueue>,
    evaluator: Arc<dyn Evaluator>,
    config: ServerConfig,
    lifecycle: Mutex<Lifecycle>,
    lifecycle_changed: Condvar,
}

impl TaskServer {
    /// Create a stopped server with the given configuration and evaluator.
    pub fn new(config: ServerConfig, evaluator: Arc<dyn Evaluator>) -> Self {
        Self {
            queue: Arc::new(TaskQueue::with_config(config.queue_config())),
            evaluator,
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: ServerState::Stopped,
                worker: None,
            }),
            lifecycle_changed: Condvar::new(),
        }
    }

    /// Create a stopped server with the default [`NumericEvaluator`].
    pub fn with_default_evaluator(config: ServerConfig) -> Self {
        Self::new(config, Arc::new(NumericEvaluator::new()))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    pub fn state(&self) -> ServerState {
        self.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    // === Lifecycle ===

    /// Start the worker.
    ///
    /// Does not return until the worker is attached to the queue, so a
    /// `submit` issued right after `start` is always serviced. Calling `start`
    /// on a running server is a no-op.
    pub fn start(&self) -> ServerResult<()> {
        let mut lifecycle = self.lifecycle.lock();

        if lifecycle.state == ServerState::Running {
            debug!("start() on a running server ignored");
            return Ok(());
        }
        state_machine::validate_transition(lifecycle.state, ServerState::Running)?;

        self.queue.open();
        let ready = Arc::new(Barrier::new(2));
        let worker = Worker::new(Arc::clone(&self.queue), Arc::clone(&self.evaluator));
        let spawned = {
            let ready = Arc::clone(&ready);
            thread::Builder::new()
                .name(self.config.worker_thread_name.clone())
                .spawn(move || worker.run(ready))
        };
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.queue.close();
                error!(error = %e, "Failed to spawn worker thread");
                return Err(TaskServerError::WorkerSpawn(e));
            }
        };
        ready.wait();

        lifecycle.state = ServerState::Running;
        lifecycle.worker = Some(handle);
        self.lifecycle_changed.notify_all();

        info!(
            evaluator = self.evaluator.name(),
            drain_policy = ?self.config.drain_policy,
            "Task server started"
        );
        Ok(())
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// The task in flight always finishes. Pending tasks are run or abandoned
    /// according to [`DrainPolicy`]. Calling `stop` on a stopped server is a
    /// no-op; concurrent callers all return once the worker has exited.
    pub fn stop(&self) -> ServerResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        loop {
            match lifecycle.state {
                ServerState::Stopped => {
                    debug!("stop() on a stopped server ignored");
                    return Ok(());
                }
                ServerState::Stopping => self.lifecycle_changed.wait(&mut lifecycle),
                ServerState::Running => break,
            }
        }

        state_machine::validate_transition(lifecycle.state, ServerState::Stopping)?;
        lifecycle.state = ServerState::Stopping;
        let handle = lifecycle.worker.take();
        drop(lifecycle);

        match self.config.drain_policy {
            DrainPolicy::Drain => {
                info!(pending = self.queue.pending_len(), "Stopping task server, draining queue");
                self.queue.close();
            }
            DrainPolicy::Abandon => {
                let abandoned = self.queue.close_and_abandon();
                if !abandoned.is_empty() {
                    warn!(count = abandoned.len(), "Abandoned pending tasks on stop");
                }
            }
        }

        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }

        let mut lifecycle = self.lifecycle.lock();
        state_machine::validate_transition(lifecycle.state, ServerState::Stopped)?;
        lifecycle.state = ServerState::Stopped;
        self.lifecycle_changed.notify_all();

        info!("Task server stopped");
        Ok(())
    }

    // === Client API ===

    /// Submit a task. Returns its id immediately.
    ///
    /// Fails with `NotRunning` unless the server is running, and fails fast
    /// with `InvalidTaskKind` / `InvalidOperands` for tasks the evaluator
    /// cannot run.
    pub fn submit(&self, kind: TaskKind, operands: impl Into<Vec<f64>>) -> ServerResult<TaskId> {
        if !state_machine::accepts_submissions(self.state()) {
            return Err(TaskServerError::NotRunning);
        }

        let operands = operands.into();
        self.evaluator
            .validate(&kind, &operands)
            .map_err(rejection)?;

        let id = self.queue.enqueue(kind, operands)?;
        Ok(id)
    }

    /// Block until the task's value is available.
    ///
    /// Uses `ServerConfig::default_await_timeout` as a bound when set.
    pub fn await_result(&self, id: TaskId) -> ServerResult<f64> {
        let result = self.await_outcome(id)?;
        into_value(result)
    }

    /// Block until the task's value is available or `timeout` elapses.
    ///
    /// A timed-out task stays queued; awaiting it again may still succeed.
    pub fn await_result_timeout(&self, id: TaskId, timeout: Duration) -> ServerResult<f64> {
        let result = self.queue.await_result_timeout(id, timeout)?;
        into_value(result)
    }

    /// Block until the task's full result record is available.
    pub fn await_outcome(&self, id: TaskId) -> ServerResult<TaskResult> {
        let result = match self.config.default_await_timeout() {
            Some(timeout) => self.queue.await_result_timeout(id, timeout)?,
            None => self.queue.await_result(id)?,
        };
        Ok(result)
    }

    /// Async variant of [`await_result`](Self::await_result) for tokio callers.
    ///
    /// `timeout` overrides `ServerConfig::default_await_timeout`.
    pub async fn await_result_async(
        &self,
        id: TaskId,
        timeout: Option<Duration>,
    ) -> ServerResult<f64> {
        let pending = self.queue.await_result_async(id);
        let result = match timeout.or(self.config.default_await_timeout()) {
            Some(waited) => tokio::time::timeout(waited, pending)
                .await
                .map_err(|_| TaskServerError::Timeout { id, waited })??,
            None => pending.await?,
        };
        into_value(result)
    }

    /// Non-blocking lookup of a published result.
    pub fn try_result(&self, id: TaskId) -> Option<TaskResult> {
        self.queue.try_result(id)
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            state: self.state(),
            evaluator: self.evaluator.name().to_string(),
            queue: self.queue.stats(),
        }
    }
}

impl Default for TaskServer {
    fn default() -> Self {
        Self::with_default_evaluator(ServerConfig::default())
    }
}

impl Drop for TaskServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "Failed to stop task server on drop");
        }
    }
}

fn rejection(err: EvalError) -> TaskServerError {
    match err {
        EvalError::UnsupportedKind(kind) => TaskServerError::InvalidTaskKind(kind),
        EvalError::Arity {
            kind,
            expected,
            actual,
        } => TaskServerError::InvalidOperands {
            kind,
            expected,
            actual,
        },
        other => TaskServerError::InvalidTaskKind(other.to_string()),
    }
}

fn into_value(result: TaskResult) -> ServerResult<f64> {
    match result.outcome {
        TaskOutcome::Value(value) => Ok(value),
        TaskOutcome::Failed(failure) => Err(TaskServerError::Evaluation {
            id: result.id,
            failure,
        }),
        TaskOutcome::Abandoned => Err(TaskServerError::Abandoned(result.id)),
    }
}
