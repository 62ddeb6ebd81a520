//! Error types for the benchmark harness
//!
//! Step failures inside a reset cycle are not errors: they are recorded as
//! step outcomes. These variants cover faults the harness itself cannot
//! absorb, plus the two mount failures the reset controller turns into a
//! reported outcome.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Process Errors ===
    #[error("Failed to spawn '{program}': {source}. Check that it is installed and on PATH")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Command has no program to run")]
    EmptyCommand,

    // === Mount Errors ===
    #[error("Mount point '{path}' not ready after {secs} seconds. Is the filesystem service starting correctly?")]
    MountTimeout { path: String, secs: u64 },

    #[error("Filesystem service exited before the mount became ready ({status})")]
    ServiceExited { status: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Unknown scenario '{0}'. Use 'fsbench check' to list configured scenarios")]
    UnknownScenario(String),

    // === Run Outcome Errors ===
    #[error("{0} scenario(s) failed, see the report above")]
    ScenariosFailed(usize),

    #[error("Reset failed at step '{step}': {reason}")]
    ResetFailed { step: String, reason: String },

    #[error("Required programs not found on PATH: {0}")]
    MissingPrograms(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },
}

impl Error {
    /// Create a spawn error for the given program
    pub fn spawn(program: &str, source: io::Error) -> Self {
        Self::Spawn {
            program: program.to_string(),
            source,
        }
    }

    /// Create a mount timeout error
    pub fn mount_timeout(path: &std::path::Path, secs: u64) -> Self {
        Self::MountTimeout {
            path: path.display().to_string(),
            secs,
        }
    }
}
