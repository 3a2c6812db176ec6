//! tasq-bench - load driver for the tasq task server
//!
//! Starts a server, runs one producer thread per kind (pow, sin, sqrt), each
//! submitting `--requests` tasks with random arguments and writing
//! `<kind> <args> = <value> correct|incorrect` lines to `<kind>.txt`.

mod producer;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tasq_server::{DrainPolicy, ServerConfig, ServerStats, TaskKind, TaskServer};
use tracing::info;

use crate::producer::{Producer, ProducerReport};

#[derive(Parser)]
#[command(name = "tasq-bench")]
#[command(about = "Drive a tasq server with concurrent producers and verify results")]
struct Cli {
    /// Tasks submitted by each producer
    #[arg(short = 'n', long, default_value = "10000")]
    requests: usize,

    /// Directory receiving pow.txt, sin.txt and sqrt.txt
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// TOML file with a ServerConfig
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured drain policy
    #[arg(long, value_enum)]
    drain_policy: Option<DrainArg>,

    /// Override the configured await timeout (milliseconds)
    #[arg(long)]
    await_timeout_ms: Option<u64>,

    /// Override the configured pending-queue bound (0 = unlimited)
    #[arg(long)]
    max_pending: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DrainArg {
    Drain,
    Abandon,
}

impl From<DrainArg> for DrainPolicy {
    fn from(arg: DrainArg) -> Self {
        match arg {
            DrainArg::Drain => DrainPolicy::Drain,
            DrainArg::Abandon => DrainPolicy::Abandon,
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    elapsed_ms: u64,
    producers: Vec<ProducerReport>,
    server: ServerStats,
}

fn load_config(cli: &Cli) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("Invalid server config in {}", path.display()))?
        }
        None => ServerConfig::default(),
    };

    if let Some(policy) = cli.drain_policy {
        config = config.with_drain_policy(policy.into());
    }
    if let Some(ms) = cli.await_timeout_ms {
        config = config.with_default_await_timeout(Duration::from_millis(ms));
    }
    if let Some(max) = cli.max_pending {
        config = config.with_max_pending(max);
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create {}", cli.output_dir.display()))?;

    info!(
        requests = cli.requests,
        output_dir = %cli.output_dir.display(),
        drain_policy = ?config.drain_policy,
        "Starting tasq-bench"
    );

    let server = Arc::new(TaskServer::with_default_evaluator(config));
    server.start()?;

    let started = Instant::now();
    let handles: Vec<_> = [TaskKind::Pow, TaskKind::Sin, TaskKind::Sqrt]
        .into_iter()
        .map(|kind| {
            let server = Arc::clone(&server);
            let output = cli.output_dir.join(format!("{kind}.txt"));
            let producer = Producer::new(kind, cli.requests, output);
            thread::spawn(move || producer.run(&server))
        })
        .collect();

    let mut producers = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle
            .join()
            .map_err(|_| anyhow!("Producer thread panicked"))??;
        producers.push(report);
    }

    server.stop()?;

    let summary = Summary {
        elapsed_ms: started.elapsed().as_millis() as u64,
        producers,
        server: server.stats(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for p in &summary.producers {
            println!(
                "{:<5} {:>7} requests  {:>7} correct  {:>3} incorrect  {:>3} failed  {:>6} ms  -> {}",
                p.kind, p.requests, p.correct, p.incorrect, p.failed, p.elapsed_ms, p.output
            );
        }
        println!(
            "total {} ms, {} tasks completed",
            summary.elapsed_ms, summary.server.queue.completed
        );
    }

    let incorrect: usize = summary.producers.iter().map(|p| p.incorrect).sum();
    if incorrect > 0 {
        return Err(anyhow!("{incorrect} results did not match the local check"));
    }
    Ok(())
}
