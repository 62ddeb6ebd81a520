//! fsbench - reset-and-benchmark harness for user-space filesystems
//!
//! Before every benchmark scenario the harness unmounts the filesystem
//! service, cleans and rebuilds it, recreates the mount point, removes the
//! backing store and remounts. Only then is the benchmark run and timed.

pub mod bench;
pub mod cli;
pub mod commands;
pub mod common;
pub mod executor;
pub mod harness;
pub mod mount;
pub mod reset;

// Re-export commonly used types for tests
pub use bench::{BenchmarkOutcome, ReportEmitter, Scenario, ScenarioResult};
pub use common::config::Config;
pub use common::{Error, Result};
pub use executor::{CommandExecutor, ExecutionResult, ProcessSpec};
pub use harness::Harness;
pub use reset::{EnvironmentReset, ResetReport, StepOutcome};
