//! A producer thread: submits one kind of task with random arguments, awaits
//! each result and records it next to a locally computed check.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::RngExt;
use serde::Serialize;
use tasq_server::{TaskKind, TaskServer, TaskServerError};
use tracing::{debug, info, warn};

const TOLERANCE: f64 = 1e-9;

pub struct Producer {
    kind: TaskKind,
    requests: usize,
    output: PathBuf,
}

/// Per-producer tally written into the JSON summary.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProducerReport {
    pub kind: String,
    pub requests: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
    pub output: String,
}

impl Producer {
    pub fn new(kind: TaskKind, requests: usize, output: PathBuf) -> Self {
        Self {
            kind,
            requests,
            output,
        }
    }

    pub fn run(&self, server: &TaskServer) -> Result<ProducerReport> {
        let file = File::create(&self.output)
            .with_context(|| format!("Failed to create {}", self.output.display()))?;
        let mut out = BufWriter::new(file);
        let mut rng = rand::rng();
        let mut report = ProducerReport {
            kind: self.kind.to_string(),
            requests: self.requests,
            output: self.output.display().to_string(),
            ..Default::default()
        };

        let started = Instant::now();
        for _ in 0..self.requests {
            let operands = random_operands(&self.kind, &mut rng);
            let id = server.submit(self.kind.clone(), operands.clone())?;

            let line = match server.await_result(id) {
                Ok(value) => {
                    let correct = is_correct(&self.kind, &operands, value);
                    if correct {
                        report.correct += 1;
                    } else {
                        report.incorrect += 1;
                        warn!(task_id = %id, kind = %self.kind, value, "Result mismatch");
                    }
                    format_line(&self.kind, &operands, &value.to_string(), correct)
                }
                Err(TaskServerError::Evaluation { failure, .. }) => {
                    report.failed += 1;
                    debug!(task_id = %id, error = %failure, "Task failed");
                    format!("{} = {}", format_call(&self.kind, &operands), failure)
                }
                Err(e) => return Err(e.into()),
            };
            writeln!(out, "{line}")?;
        }
        out.flush()?;

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            kind = %report.kind,
            requests = report.requests,
            correct = report.correct,
            elapsed_ms = report.elapsed_ms,
            "Producer finished"
        );
        Ok(report)
    }
}

fn random_operands(kind: &TaskKind, rng: &mut impl RngExt) -> Vec<f64> {
    match kind {
        TaskKind::Pow => vec![
            rng.random_range(1..=10) as f64,
            rng.random_range(1..=10) as f64,
        ],
        _ => vec![rng.random_range(0.0..10.0)],
    }
}

/// Reference value computed without the server.
fn expected(kind: &TaskKind, operands: &[f64]) -> Option<f64> {
    match (kind, operands) {
        (TaskKind::Sin, [x]) => Some(x.sin()),
        (TaskKind::Sqrt, [x]) => Some(x.sqrt()),
        (TaskKind::Pow, [x, y]) => Some(x.powf(*y)),
        _ => None,
    }
}

fn is_correct(kind: &TaskKind, operands: &[f64], value: f64) -> bool {
    expected(kind, operands).is_some_and(|want| (want - value).abs() < TOLERANCE)
}

fn format_call(kind: &TaskKind, operands: &[f64]) -> String {
    let args: Vec<String> = operands.iter().map(f64::to_string).collect();
    format!("{} {}", kind, args.join(" "))
}

fn format_line(kind: &TaskKind, operands: &[f64], value: &str, correct: bool) -> String {
    let verdict = if correct { "correct" } else { "incorrect" };
    format!("{} = {} {}", format_call(kind, operands), value, verdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let line = format_line(&TaskKind::Pow, &[3.0, 4.0], &81.0f64.to_string(), true);
        assert_eq!(line, "pow 3 4 = 81 correct");
        let line = format_line(&TaskKind::Sqrt, &[2.25], "1.5", false);
        assert_eq!(line, "sqrt 2.25 = 1.5 incorrect");
    }

    #[test]
    fn test_random_operands_shape() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let pow = random_operands(&TaskKind::Pow, &mut rng);
            assert_eq!(pow.len(), 2);
            assert!(pow.iter().all(|v| (1.0..=10.0).contains(v) && v.fract() == 0.0));

            let sin = random_operands(&TaskKind::Sin, &mut rng);
            assert_eq!(sin.len(), 1);
            assert!((0.0..10.0).contains(&sin[0]));
        }
    }

    #[test]
    fn test_producer_writes_one_checked_line_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let server = TaskServer::default();
        server.start().unwrap();

        let path = dir.path().join("sqrt.txt");
        let report = Producer::new(TaskKind::Sqrt, 25, path.clone())
            .run(&server)
            .unwrap();
        server.stop().unwrap();

        assert_eq!(report.correct, 25);
        assert_eq!(report.incorrect + report.failed, 0);
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 25);
        assert!(lines.iter().all(|l| l.starts_with("sqrt ") && l.ends_with(" correct")));
    }

    #[test]
    fn test_producer_requires_running_server() {
        let dir = tempfile::tempdir().unwrap();
        let server = TaskServer::default();
        let result = Producer::new(TaskKind::Sin, 1, dir.path().join("sin.txt")).run(&server);
        assert!(result.is_err());
    }
}
