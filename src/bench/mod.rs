//! Benchmark scenarios: running, timing and reporting

mod report;
mod runner;

pub use report::ReportEmitter;
pub use runner::{BenchmarkOutcome, BenchmarkRunner};

use crate::executor::ProcessSpec;

/// One benchmark executable run against a freshly reset environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub label: String,
    pub command: ProcessSpec,
}

impl Scenario {
    pub fn new(label: impl Into<String>, command: ProcessSpec) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

/// Final result of a scenario
#[derive(Debug, Clone)]
pub enum ScenarioResult {
    /// Environment was reset and the benchmark exited successfully
    Completed(BenchmarkOutcome),
    /// Reset, launch or benchmark failed
    Failed {
        label: String,
        reason: String,
        /// Present when the benchmark itself ran
        outcome: Option<BenchmarkOutcome>,
    },
}

impl ScenarioResult {
    /// Classify a finished benchmark run
    pub fn from_outcome(outcome: BenchmarkOutcome) -> Self {
        match outcome.fault() {
            None => ScenarioResult::Completed(outcome),
            Some(reason) => ScenarioResult::Failed {
                label: outcome.label.clone(),
                reason,
                outcome: Some(outcome),
            },
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ScenarioResult::Completed(outcome) => &outcome.label,
            ScenarioResult::Failed { label, .. } => label,
        }
    }

    pub fn outcome(&self) -> Option<&BenchmarkOutcome> {
        match self {
            ScenarioResult::Completed(outcome) => Some(outcome),
            ScenarioResult::Failed { outcome, .. } => outcome.as_ref(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ScenarioResult::Completed(_))
    }
}
