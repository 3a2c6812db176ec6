//! The worker thread that runs tasks.
//!
//! Exactly one worker consumes a queue. Tasks run one at a time, in the order
//! the queue hands them out.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::time::Instant;

use tasq_queue::{FailureReason, Task, TaskFailure, TaskOutcome, TaskQueue};
use tracing::{debug, error, info, warn};

use crate::evaluator::Evaluator;

pub(crate) struct Worker {
    queue: Arc<TaskQueue>,
    evaluator: Arc<dyn Evaluator>,
}

/// Detaches the worker from the queue on every exit path.
struct DetachOnExit<'a>(&'a TaskQueue);

impl Drop for DetachOnExit<'_> {
    fn drop(&mut self) {
        self.0.detach_worker();
    }
}

impl Worker {
    pub(crate) fn new(queue: Arc<TaskQueue>, evaluator: Arc<dyn Evaluator>) -> Self {
        Self { queue, evaluator }
    }

    /// Runs the worker loop until the queue is closed and empty.
    ///
    /// `ready` is released once the worker is attached and about to wait on
    /// the queue; `start()` blocks on it.
    pub(crate) fn run(self, ready: Arc<Barrier>) {
        self.queue.attach_worker();
        let _detach = DetachOnExit(&self.queue);
        ready.wait();

        info!(evaluator = self.evaluator.name(), "Worker started");
        let mut executed: u64 = 0;

        while let Some(task) = self.queue.dequeue() {
            let outcome = self.execute(&task);
            if let Err(e) = self.queue.publish_result(task.id, outcome) {
                error!(task_id = %task.id, error = %e, "Failed to publish task result");
            }
            executed += 1;
        }

        info!(executed, "Worker stopped");
    }

    fn execute(&self, task: &Task) -> TaskOutcome {
        let start = Instant::now();
        let evaluated = panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluator.evaluate(&task.kind, &task.operands)
        }));

        let outcome = match evaluated {
            Ok(Ok(value)) => TaskOutcome::Value(value),
            Ok(Err(e)) => {
                warn!(task_id = %task.id, kind = %task.kind, error = %e, "Task evaluation failed");
                TaskOutcome::Failed(e.into())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(task_id = %task.id, kind = %task.kind, panic = %message, "Evaluator panicked");
                TaskOutcome::Failed(TaskFailure::new(FailureReason::Panicked, message))
            }
        };

        debug!(
            task_id = %task.id,
            kind = %task.kind,
            elapsed_us = start.elapsed().as_micros() as u64,
            ok = outcome.is_value(),
            "Task execution completed"
        );
        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "evaluator panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::NumericEvaluator;
    use std::thread;
    use tasq_queue::TaskKind;

    fn spawn_worker(
        queue: &Arc<TaskQueue>,
        evaluator: Arc<dyn Evaluator>,
    ) -> thread::JoinHandle<()> {
        queue.open();
        let ready = Arc::new(Barrier::new(2));
        let worker = Worker::new(Arc::clone(queue), evaluator);
        let handle = {
            let ready = Arc::clone(&ready);
            thread::spawn(move || worker.run(ready))
        };
        ready.wait();
        handle
    }

    #[test]
    fn test_worker_drains_and_detaches() {
        let queue = Arc::new(TaskQueue::new());
        let handle = spawn_worker(&queue, Arc::new(NumericEvaluator::new()));

        let a = queue.enqueue(TaskKind::Sqrt, vec![25.0]).unwrap();
        let b = queue.enqueue(TaskKind::Pow, vec![2.0, 5.0]).unwrap();
        queue.close();
        handle.join().unwrap();

        assert_eq!(queue.try_result(a).unwrap().outcome.value(), Some(5.0));
        assert_eq!(queue.try_result(b).unwrap().outcome.value(), Some(32.0));
        assert!(!queue.stats().worker_attached);
    }

    #[test]
    fn test_worker_survives_panicking_evaluator() {
        let queue = Arc::new(TaskQueue::new());
        let evaluator = NumericEvaluator::new().with_function("boom", 0, |_| panic!("kaboom"));
        let handle = spawn_worker(&queue, Arc::new(evaluator));

        let bad = queue.enqueue(TaskKind::custom("boom"), vec![]).unwrap();
        let good = queue.enqueue(TaskKind::Sin, vec![0.0]).unwrap();

        let result = queue.await_result(bad).unwrap();
        match result.outcome {
            TaskOutcome::Failed(failure) => {
                assert_eq!(failure.reason, FailureReason::Panicked);
                assert_eq!(failure.message, "kaboom");
            }
            other => panic!("Expected Failed outcome, got: {:?}", other),
        }
        assert!(queue.await_result(good).unwrap().outcome.is_value());

        queue.close();
        handle.join().unwrap();
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "evaluator panicked");
    }
}
