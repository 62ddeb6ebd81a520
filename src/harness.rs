//! Scenario sequencing
//!
//! Each scenario walks `Idle → Resetting → Mounting → Benchmarking →
//! Reporting → Idle`. There is no failure state: a failed reset step is
//! recorded against the scenario, but the benchmark still runs and the next
//! scenario still follows.

use std::fmt;
use std::io::Write;

use crate::bench::{BenchmarkRunner, ReportEmitter, Scenario, ScenarioResult};
use crate::common::config::Config;
use crate::common::Result;
use crate::executor::CommandExecutor;
use crate::reset::{EnvironmentReset, ResetReport};

/// Where a scenario currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resetting,
    Mounting,
    Benchmarking,
    Reporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Resetting => "resetting",
            Phase::Mounting => "mounting",
            Phase::Benchmarking => "benchmarking",
            Phase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Drives reset, benchmark and report for each scenario in turn
pub struct Harness<W: Write> {
    reset: EnvironmentReset,
    runner: BenchmarkRunner,
    emitter: ReportEmitter<W>,
    phase: Phase,
}

impl Harness<std::io::Stdout> {
    /// Harness reporting to stdout
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_emitter(config, ReportEmitter::stdout())
    }
}

impl<W: Write> Harness<W> {
    pub fn with_emitter(config: &Config, emitter: ReportEmitter<W>) -> Result<Self> {
        let executor = CommandExecutor::new(config.resolved_workdir()?, config.diagnostics);
        Ok(Self {
            reset: EnvironmentReset::from_config(config, executor.clone())?,
            runner: BenchmarkRunner::new(executor),
            emitter,
            phase: Phase::Idle,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn environment(&self) -> &EnvironmentReset {
        &self.reset
    }

    fn enter(&mut self, phase: Phase, label: &str) {
        tracing::debug!("[{}] {} -> {}", label, self.phase, phase);
        self.phase = phase;
    }

    /// Run every scenario in order, reporting each as it finishes
    pub async fn run(&mut self, scenarios: &[Scenario]) -> Result<Vec<ScenarioResult>> {
        let mut results = Vec::with_capacity(scenarios.len());

        for scenario in scenarios {
            let result = self.run_one(scenario).await?;
            results.push(result);
        }

        self.emitter.summary(&results)?;
        Ok(results)
    }

    /// Reset, benchmark and report a single scenario
    pub async fn run_one(&mut self, scenario: &Scenario) -> Result<ScenarioResult> {
        let label = scenario.label.as_str();
        tracing::info!("Scenario '{}'", label);

        self.enter(Phase::Resetting, label);
        let mut report = self.reset.prepare().await;
        self.enter(Phase::Mounting, label);
        self.reset.remount(&mut report).await;

        let reset_failure = report
            .failure()
            .map(|failed| format!("{}: {}", failed.name, failed.reason().unwrap_or("failed")));
        if let Some(reason) = &reset_failure {
            tracing::warn!("Reset for '{}' failed ({}), benchmarking anyway", label, reason);
        }

        self.enter(Phase::Benchmarking, label);
        let benchmark = self.runner.run(label, &scenario.command).await;

        let result = match (reset_failure, benchmark) {
            (None, Ok(outcome)) => ScenarioResult::from_outcome(outcome),
            (None, Err(e)) => ScenarioResult::Failed {
                label: label.to_string(),
                reason: e.to_string(),
                outcome: None,
            },
            (Some(reason), Ok(outcome)) => ScenarioResult::Failed {
                label: label.to_string(),
                reason,
                outcome: Some(outcome),
            },
            (Some(reason), Err(e)) => ScenarioResult::Failed {
                label: label.to_string(),
                reason: format!("{}; {}", reason, e),
                outcome: None,
            },
        };

        self.enter(Phase::Reporting, label);
        self.emitter.emit(&result)?;
        self.enter(Phase::Idle, label);

        Ok(result)
    }

    /// Run one reset cycle without a benchmark
    pub async fn reset_only(&mut self) -> ResetReport {
        self.enter(Phase::Resetting, "reset");
        let mut report = self.reset.prepare().await;
        self.enter(Phase::Mounting, "reset");
        self.reset.remount(&mut report).await;
        self.enter(Phase::Idle, "reset");
        report
    }
}
