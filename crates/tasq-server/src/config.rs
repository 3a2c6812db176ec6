//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tasq_queue::QueueConfig;

/// What `stop()` does with tasks still waiting in the pending set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Run every queued task before the worker exits
    #[default]
    Drain,
    /// Drop queued tasks, publishing an abandoned outcome for each
    Abandon,
}

/// Configuration for a [`TaskServer`](crate::TaskServer).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Policy applied to pending tasks on stop
    pub drain_policy: DrainPolicy,
    /// Maximum number of tasks waiting in the pending set (0 = unlimited)
    pub max_pending: usize,
    /// Bound applied by `await_result` when set (milliseconds)
    pub default_await_timeout_ms: Option<u64>,
    /// Name given to the worker thread
    pub worker_thread_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            drain_policy: DrainPolicy::Drain,
            max_pending: 0,
            default_await_timeout_ms: None,
            worker_thread_name: "tasq-worker".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn with_drain_policy(mut self, policy: DrainPolicy) -> Self {
        self.drain_policy = policy;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Sub-millisecond bounds round up to 1ms; bounds beyond `u64::MAX`
    /// milliseconds saturate.
    pub fn with_default_await_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.default_await_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    pub fn default_await_timeout(&self) -> Option<Duration> {
        self.default_await_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_pending: self.max_pending,
        }
    }
}
