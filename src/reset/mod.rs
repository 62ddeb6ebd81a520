//! Environment reset controller
//!
//! Brings the working tree back to a known baseline before every scenario:
//! unmount, clean, recreate the mount point, drop the backing store, rebuild,
//! remount. Every step runs even if an earlier one failed, since the usual
//! starting point is whatever an interrupted run left behind.

mod step;

pub use step::{Action, FailurePolicy, ResetReport, Step, StepKind, StepOutcome, StepRecord};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::config::{Config, ReadyProbe};
use crate::common::{paths, Result};
use crate::executor::{CommandExecutor, ExecutionResult, ProcessSpec};
use crate::mount;

pub const STEP_UNMOUNT: &str = "unmount";
pub const STEP_CLEAN: &str = "clean";
pub const STEP_REMOVE_MOUNT_DIR: &str = "remove-mount-dir";
pub const STEP_CREATE_MOUNT_DIR: &str = "create-mount-dir";
pub const STEP_REMOVE_BACKING_STORE: &str = "remove-backing-store";
pub const STEP_BUILD: &str = "build";
pub const STEP_MOUNT: &str = "mount";

/// Runs the reset sequence against one working tree
#[derive(Debug, Clone)]
pub struct EnvironmentReset {
    executor: CommandExecutor,
    mount_dir: PathBuf,
    backing_store: PathBuf,
    probe: ReadyProbe,
    ready_timeout: Duration,
    steps: Vec<Step>,
}

impl EnvironmentReset {
    /// Build the step table from configuration
    ///
    /// Mount point and backing store resolve against the executor's workdir.
    pub fn from_config(config: &Config, executor: CommandExecutor) -> Result<Self> {
        let mount_dir = paths::resolve(executor.workdir(), &config.mount.dir);
        let backing_store = paths::resolve(executor.workdir(), &config.mount.backing_store);
        let mount_arg = mount_dir.to_string_lossy().into_owned();

        let unmount = ProcessSpec::from_tokens(&config.mount.unmount)?.arg(mount_arg);
        let clean = ProcessSpec::from_tokens(&config.build.clean)?;
        let build = ProcessSpec::from_tokens(&config.build.build)?;
        let service =
            ProcessSpec::new(config.service.program.clone()).args(config.service.args.iter().cloned());

        use FailurePolicy::{Report, Tolerate};
        let steps = vec![
            Step::new(STEP_UNMOUNT, StepKind::Unmount(unmount), Tolerate),
            Step::new(STEP_CLEAN, StepKind::Process(clean), Tolerate),
            Step::new(STEP_REMOVE_MOUNT_DIR, StepKind::Action(Action::RemoveMountDir), Report),
            Step::new(STEP_CREATE_MOUNT_DIR, StepKind::Action(Action::CreateMountDir), Report),
            Step::new(
                STEP_REMOVE_BACKING_STORE,
                StepKind::Action(Action::RemoveBackingStore),
                Report,
            ),
            Step::new(STEP_BUILD, StepKind::Process(build), Report),
            Step::new(STEP_MOUNT, StepKind::Mount(service), Report),
        ];

        Ok(Self {
            executor,
            mount_dir,
            backing_store,
            probe: config.mount.probe,
            ready_timeout: Duration::from_secs(config.mount.ready_timeout_secs),
            steps,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mount_dir(&self) -> &Path {
        &self.mount_dir
    }

    pub fn backing_store(&self) -> &Path {
        &self.backing_store
    }

    /// Run every step in order
    ///
    /// Never fails as a whole: each step's outcome is recorded and
    /// [`ResetReport::failure`] tells whether the environment is usable.
    pub async fn reset(&self) -> ResetReport {
        let mut report = self.prepare().await;
        self.remount(&mut report).await;
        report
    }

    /// Teardown and rebuild: every step except the mount
    pub async fn prepare(&self) -> ResetReport {
        let mut report = ResetReport::default();
        for step in self.steps.iter().filter(|s| !matches!(s.kind, StepKind::Mount(_))) {
            self.run_into(step, &mut report).await;
        }
        report
    }

    /// Launch the service and wait for the mount, appending to `report`
    pub async fn remount(&self, report: &mut ResetReport) {
        for step in self.steps.iter().filter(|s| matches!(s.kind, StepKind::Mount(_))) {
            self.run_into(step, report).await;
        }
    }

    async fn run_into(&self, step: &Step, report: &mut ResetReport) {
        tracing::debug!("Reset step '{}'", step.name);

        let outcome = if step.name == STEP_BUILD && !mount::is_absent(&self.backing_store) {
            StepOutcome::Failed(format!(
                "backing store {} still present before build",
                self.backing_store.display()
            ))
        } else {
            self.run_step(step, report.failure().is_some()).await
        };

        match (&outcome, step.policy) {
            (StepOutcome::Failed(reason), FailurePolicy::Tolerate) => {
                tracing::debug!("Step '{}' failed (tolerated): {}", step.name, reason)
            }
            (StepOutcome::Failed(reason), FailurePolicy::Report) => {
                tracing::warn!("Step '{}' failed: {}", step.name, reason)
            }
            _ => tracing::debug!("Step '{}': {}", step.name, outcome),
        }

        report.steps.push(StepRecord {
            name: step.name,
            policy: step.policy,
            outcome,
        });
    }

    /// `after_failure` is set once an earlier reported step has failed
    async fn run_step(&self, step: &Step, after_failure: bool) -> StepOutcome {
        match &step.kind {
            StepKind::Unmount(spec) => {
                if mount::is_absent(&self.mount_dir) {
                    StepOutcome::AlreadyClean
                } else {
                    self.run_process(spec).await
                }
            }
            StepKind::Process(spec) => self.run_process(spec).await,
            StepKind::Action(action) => self.perform(*action),
            StepKind::Mount(service) => self.mount(service, after_failure).await,
        }
    }

    async fn run_process(&self, spec: &ProcessSpec) -> StepOutcome {
        match self.executor.run(spec).await {
            Ok(result) if result.success() => StepOutcome::Succeeded,
            Ok(result) => StepOutcome::Failed(failure_reason(spec, &result)),
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    fn perform(&self, action: Action) -> StepOutcome {
        let result = match action {
            Action::RemoveMountDir => {
                if mount::is_absent(&self.mount_dir) {
                    return StepOutcome::AlreadyClean;
                }
                if self.mount_dir.is_dir() {
                    std::fs::remove_dir_all(&self.mount_dir)
                } else {
                    std::fs::remove_file(&self.mount_dir)
                }
            }
            Action::CreateMountDir => create_empty_dir(&self.mount_dir),
            Action::RemoveBackingStore => {
                if mount::is_absent(&self.backing_store) {
                    return StepOutcome::AlreadyClean;
                }
                std::fs::remove_file(&self.backing_store)
            }
        };

        match result {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    async fn mount(&self, service: &ProcessSpec, after_failure: bool) -> StepOutcome {
        let mut handle = match mount::launch(&self.executor, service, &self.mount_dir) {
            Ok(handle) => handle,
            Err(e) => return StepOutcome::Failed(e.to_string()),
        };

        if self.ready_timeout.is_zero() {
            tracing::debug!("Readiness wait disabled, not waiting for mount");
            return StepOutcome::Succeeded;
        }
        if after_failure {
            return StepOutcome::Failed("readiness not awaited after an earlier failed step".into());
        }

        match mount::await_ready(&mut handle, self.probe, self.ready_timeout).await {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

/// Create `path` and verify it is empty
fn create_empty_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)?;
    if std::fs::read_dir(path)?.next().is_some() {
        return Err(std::io::Error::other(format!(
            "{} exists and is not empty",
            path.display()
        )));
    }
    Ok(())
}

fn failure_reason(spec: &ProcessSpec, result: &ExecutionResult) -> String {
    match result.stderr_excerpt() {
        Some(line) => format!("'{}' {}: {}", spec, result.describe_status(), line),
        None => format!("'{}' {}", spec, result.describe_status()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(dir: &Path, config: &Config) -> EnvironmentReset {
        EnvironmentReset::from_config(config, CommandExecutor::new(dir, false)).unwrap()
    }

    #[test]
    fn step_table_order_and_policy() {
        let dir = tempfile::tempdir().unwrap();
        let reset = controller(dir.path(), &Config::default());

        let table: Vec<_> = reset.steps().iter().map(|s| (s.name, s.policy)).collect();
        assert_eq!(
            table,
            [
                (STEP_UNMOUNT, FailurePolicy::Tolerate),
                (STEP_CLEAN, FailurePolicy::Tolerate),
                (STEP_REMOVE_MOUNT_DIR, FailurePolicy::Report),
                (STEP_CREATE_MOUNT_DIR, FailurePolicy::Report),
                (STEP_REMOVE_BACKING_STORE, FailurePolicy::Report),
                (STEP_BUILD, FailurePolicy::Report),
                (STEP_MOUNT, FailurePolicy::Report),
            ]
        );
    }

    #[test]
    fn unmount_targets_resolved_mount_dir() {
        let dir = tempfile::tempdir().unwrap();
        let reset = controller(dir.path(), &Config::default());

        let StepKind::Unmount(spec) = &reset.steps()[0].kind else {
            panic!("first step must unmount");
        };
        let expected = dir.path().join("mountdir");
        assert_eq!(spec.program, "fusermount");
        assert_eq!(spec.args, vec!["-u".to_string(), expected.to_string_lossy().into_owned()]);
    }

    #[test]
    fn filesystem_actions_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let reset = controller(dir.path(), &Config::default());

        assert_eq!(reset.perform(Action::RemoveMountDir), StepOutcome::AlreadyClean);
        assert_eq!(reset.perform(Action::RemoveBackingStore), StepOutcome::AlreadyClean);

        assert_eq!(reset.perform(Action::CreateMountDir), StepOutcome::Succeeded);
        std::fs::write(reset.mount_dir().join("leftover"), b"x").unwrap();
        std::fs::write(reset.backing_store(), b"image").unwrap();

        assert_eq!(reset.perform(Action::RemoveMountDir), StepOutcome::Succeeded);
        assert_eq!(reset.perform(Action::RemoveBackingStore), StepOutcome::Succeeded);
        assert!(!reset.mount_dir().exists());
        assert!(!reset.backing_store().exists());
    }

    #[test]
    fn create_refuses_non_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let reset = controller(dir.path(), &Config::default());
        std::fs::create_dir(reset.mount_dir()).unwrap();
        std::fs::write(reset.mount_dir().join("stale"), b"x").unwrap();

        assert!(reset.perform(Action::CreateMountDir).is_failed());
    }

    #[tokio::test]
    async fn missing_tools_are_tolerated_or_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_toml(
            r#"
            [mount]
            unmount = ["fsbench-missing-fusermount"]
            probe = "listable"
            ready_timeout_secs = 1

            [build]
            clean = ["fsbench-missing-make", "clean"]
            build = ["fsbench-missing-make"]

            [service]
            program = "fsbench-missing-service"
            args = []
            "#,
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("mountdir")).unwrap();

        let report = controller(dir.path(), &config).reset().await;

        assert_eq!(report.steps.len(), 7);
        assert!(report.outcome(STEP_UNMOUNT).unwrap().is_failed());
        assert!(report.outcome(STEP_CLEAN).unwrap().is_failed());
        assert_eq!(report.outcome(STEP_CREATE_MOUNT_DIR), Some(&StepOutcome::Succeeded));
        assert_eq!(report.failure().unwrap().name, STEP_BUILD);
        assert!(report.outcome(STEP_MOUNT).unwrap().is_failed());
    }

    #[tokio::test]
    async fn build_never_runs_over_a_leftover_backing_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.mount.unmount = vec!["true".to_string()];
        config.build.clean = vec!["true".to_string()];
        config.build.build = vec!["sh".into(), "-c".into(), "touch built".into()];
        let reset = controller(dir.path(), &config);

        // A non-empty directory survives remove_file
        std::fs::create_dir(reset.backing_store()).unwrap();
        std::fs::write(reset.backing_store().join("block"), b"x").unwrap();

        let report = reset.prepare().await;

        assert!(report.outcome(STEP_REMOVE_BACKING_STORE).unwrap().is_failed());
        let failure = report.failure().unwrap();
        assert_eq!(failure.name, STEP_REMOVE_BACKING_STORE);
        let build = report.outcome(STEP_BUILD).unwrap();
        assert!(build.to_string().contains("still present before build"), "{}", build);
        assert!(!dir.path().join("built").exists());
    }

    #[tokio::test]
    async fn mount_after_failed_build_does_not_wait() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.mount.unmount = vec!["true".to_string()];
        config.mount.probe = ReadyProbe::Mounted;
        config.mount.ready_timeout_secs = 30;
        config.build.clean = vec!["true".to_string()];
        config.build.build = vec!["sh".into(), "-c".into(), "exit 2".into()];
        config.service.program = "sh".to_string();
        config.service.args = vec!["-c".to_string(), "exit 0".to_string()];
        let reset = controller(dir.path(), &config);

        let start = std::time::Instant::now();
        let report = reset.reset().await;

        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(report.failure().unwrap().name, STEP_BUILD);
        let mount = report.outcome(STEP_MOUNT).unwrap();
        assert!(mount.to_string().contains("not awaited"), "{}", mount);
    }
}
