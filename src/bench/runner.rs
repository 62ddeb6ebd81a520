//! Benchmark runner
//!
//! Times one benchmark process. The clock covers the benchmark invocation
//! only; reset, build and mount time are never included.

use std::process::ExitStatus;
use std::time::{Duration, Instant};

use crate::common::Result;
use crate::executor::{describe_status, CommandExecutor, ProcessSpec};

/// Timing and output of one benchmark run
#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    pub label: String,
    pub elapsed: Duration,
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl BenchmarkOutcome {
    /// Elapsed wall-clock time in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Why the benchmark counts as failed, if it does
    pub fn fault(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        let status = describe_status(&self.status);
        Some(
            match self.stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()) {
                Some(line) => format!("benchmark {}: {}", status, line),
                None => format!("benchmark {}", status),
            },
        )
    }
}

/// Runs benchmark executables through the command executor
#[derive(Debug, Clone)]
pub struct BenchmarkRunner {
    executor: CommandExecutor,
}

impl BenchmarkRunner {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    /// Run `command` once and time it
    pub async fn run(&self, label: &str, command: &ProcessSpec) -> Result<BenchmarkOutcome> {
        tracing::debug!("Benchmark '{}': {}", label, command);

        let start = Instant::now();
        let result = self.executor.capture(command).await?;
        let elapsed = start.elapsed();

        tracing::info!(
            "Benchmark '{}' finished in {:.3}s ({})",
            label,
            elapsed.as_secs_f64(),
            result.describe_status()
        );

        Ok(BenchmarkOutcome {
            label: label.to_string(),
            elapsed,
            stdout: result.stdout,
            stderr: result.stderr,
            status: result.status,
        })
    }
}
