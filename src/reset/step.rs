//! Reset step types
//!
//! A step is either an external process or an action the harness performs
//! itself. The two are separate variants so a filesystem action can never be
//! handed to the process executor.

use std::fmt;

use crate::executor::ProcessSpec;

/// Filesystem actions performed in-process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Recursively remove the mount point directory
    RemoveMountDir,
    /// Create the mount point directory, empty
    CreateMountDir,
    /// Remove the backing store file if present
    RemoveBackingStore,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Unmount the mount point; skipped when the directory does not exist
    Unmount(ProcessSpec),
    /// Run an external process to completion
    Process(ProcessSpec),
    /// Perform a filesystem action directly
    Action(Action),
    /// Launch the filesystem service detached, then wait for readiness
    Mount(ProcessSpec),
}

/// How a failed step affects the reset cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Failure means the target state already holds; absorb it
    Tolerate,
    /// Failure leaves the environment unusable; report it
    Report,
}

/// A named, ordered unit of the reset sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: &'static str,
    pub kind: StepKind,
    pub policy: FailurePolicy,
}

impl Step {
    pub fn new(name: &'static str, kind: StepKind, policy: FailurePolicy) -> Self {
        Self { name, kind, policy }
    }
}

/// Result of running one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do: the step's target state was already in place
    AlreadyClean,
    Succeeded,
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::AlreadyClean => write!(f, "already clean"),
            StepOutcome::Succeeded => write!(f, "ok"),
            StepOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// A step's outcome, kept with the policy it ran under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: &'static str,
    pub policy: FailurePolicy,
    pub outcome: StepOutcome,
}

impl StepRecord {
    /// Whether this record makes the reset cycle a failure
    pub fn is_blocking(&self) -> bool {
        self.policy == FailurePolicy::Report && self.outcome.is_failed()
    }

    /// Failure reason, if the step failed
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Outcome of a full reset cycle, in step order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetReport {
    pub steps: Vec<StepRecord>,
}

impl ResetReport {
    /// First failure that was not tolerated
    pub fn failure(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.is_blocking())
    }

    pub fn is_clean(&self) -> bool {
        self.failure().is_none()
    }

    /// Look up a step's outcome by name
    pub fn outcome(&self, name: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|r| r.name == name).map(|r| &r.outcome)
    }
}
