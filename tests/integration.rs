//! End-to-end tests for the reset-and-benchmark harness
//!
//! Each test builds a scratch working tree in a temp directory with `sh`
//! stubs standing in for the build system, the filesystem service and the
//! benchmark executables:
//! - `clean` removes the service stub
//! - `build` records whether the backing store exists, then writes the stub
//! - the service stub logs its launch arguments
//!
//! Scripts are run through `sh <file>` rather than exec'd directly so a
//! freshly written file is never executed while another thread holds it open.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fsbench::bench::ScenarioResult;
use fsbench::common::config::{Config, ReadyProbe};
use fsbench::reset::{
    STEP_BUILD, STEP_CLEAN, STEP_CREATE_MOUNT_DIR, STEP_MOUNT, STEP_REMOVE_BACKING_STORE,
    STEP_REMOVE_MOUNT_DIR, STEP_UNMOUNT,
};
use fsbench::{Harness, ProcessSpec, ReportEmitter, Scenario, StepOutcome};
use tempfile::TempDir;

const BUILD_SCRIPT: &str = r#"
if [ -e DISKFILE ]; then echo present; else echo absent; fi >> build.log
cat > rufs.sh <<'EOF'
echo "$@" >> launches.log
EOF
"#;

/// Like `BUILD_SCRIPT`, but the service writes its backing store before
/// logging the launch
const BUILD_WITH_STORE_SCRIPT: &str = r#"
if [ -e DISKFILE ]; then echo present; else echo absent; fi >> build.log
cat > rufs.sh <<'EOF'
echo image > DISKFILE
echo "$@" >> launches.log
EOF
"#;

/// Scratch working tree with stub build, service and benchmarks
struct TestContext {
    dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Write a benchmark script and return a scenario running it
    fn scenario(&self, label: &str, name: &str, body: &str) -> Scenario {
        fs::write(self.file(name), body).expect("Failed to write benchmark");
        Scenario::new(label, ProcessSpec::new("sh").arg(name))
    }

    /// Configuration wired to the stubs
    fn config(&self) -> Config {
        let mut config = Config {
            workdir: self.path().to_path_buf(),
            ..Config::default()
        };
        config.mount.unmount = sh(&["echo 'not mounted' >&2; exit 1", "unmount"]);
        config.mount.probe = ReadyProbe::Listable;
        config.mount.ready_timeout_secs = 2;
        config.build.clean = sh(&["rm -f rufs.sh"]);
        config.build.build = sh(&[BUILD_SCRIPT]);
        config.service.program = "sh".to_string();
        config.service.args = vec!["rufs.sh".to_string(), "-s".to_string()];
        config
    }

    fn harness(&self, config: &Config) -> Harness<Vec<u8>> {
        Harness::with_emitter(config, ReportEmitter::new(Vec::new()))
            .expect("Failed to create harness")
    }

    fn lines(&self, name: &str) -> Vec<String> {
        fs::read_to_string(self.file(name))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Wait for a detached stub to append its `count`-th line
    fn wait_for_lines(&self, name: &str, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let lines = self.lines(name);
            if lines.len() >= count || Instant::now() >= deadline {
                return lines;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    fn mount_dir_entries(&self) -> usize {
        fs::read_dir(self.file("mountdir"))
            .expect("mount point missing")
            .count()
    }
}

fn sh(script: &[&str]) -> Vec<String> {
    let mut tokens = vec!["sh".to_string(), "-c".to_string()];
    tokens.extend(script.iter().map(|s| s.to_string()));
    tokens
}

fn completed(result: &ScenarioResult) -> &fsbench::BenchmarkOutcome {
    match result {
        ScenarioResult::Completed(outcome) => outcome,
        ScenarioResult::Failed { reason, .. } => panic!("scenario failed: {}", reason),
    }
}

#[tokio::test]
async fn reset_from_pristine_tree() {
    let ctx = TestContext::new();
    let mut harness = ctx.harness(&ctx.config());

    let report = harness.reset_only().await;

    assert!(report.is_clean(), "reset failed: {:?}", report.failure());
    assert_eq!(report.outcome(STEP_UNMOUNT), Some(&StepOutcome::AlreadyClean));
    assert_eq!(report.outcome(STEP_REMOVE_MOUNT_DIR), Some(&StepOutcome::AlreadyClean));
    assert_eq!(report.outcome(STEP_REMOVE_BACKING_STORE), Some(&StepOutcome::AlreadyClean));
    assert_eq!(report.outcome(STEP_CREATE_MOUNT_DIR), Some(&StepOutcome::Succeeded));
    assert_eq!(report.outcome(STEP_BUILD), Some(&StepOutcome::Succeeded));
    assert_eq!(report.outcome(STEP_MOUNT), Some(&StepOutcome::Succeeded));

    assert!(ctx.file("mountdir").is_dir());
    assert_eq!(ctx.mount_dir_entries(), 0);

    let launches = ctx.wait_for_lines("launches.log", 1);
    let expected = format!("-s {}", harness.environment().mount_dir().display());
    assert_eq!(launches, vec![expected]);
}

#[tokio::test]
async fn reset_twice_matches_reset_once() {
    let ctx = TestContext::new();
    let mut harness = ctx.harness(&ctx.config());

    let first = harness.reset_only().await;
    ctx.wait_for_lines("launches.log", 1);
    let second = harness.reset_only().await;
    ctx.wait_for_lines("launches.log", 2);

    assert!(first.is_clean());
    assert!(second.is_clean());

    // The second pass finds a mount point to unmount; the stub unmount
    // fails and that failure is tolerated.
    assert!(second.outcome(STEP_UNMOUNT).unwrap().is_failed());
    assert_eq!(second.outcome(STEP_REMOVE_MOUNT_DIR), Some(&StepOutcome::Succeeded));

    assert!(ctx.file("mountdir").is_dir());
    assert_eq!(ctx.mount_dir_entries(), 0);
    assert!(ctx.file("rufs.sh").exists());
    assert_eq!(ctx.lines("launches.log").len(), 2);
}

#[tokio::test]
async fn backing_store_never_exists_at_build_time() {
    let ctx = TestContext::new();
    // Leftover image from an earlier crashed run
    fs::write(ctx.file("DISKFILE"), b"stale image").unwrap();

    let mut config = ctx.config();
    config.build.build = sh(&[BUILD_WITH_STORE_SCRIPT]);

    let mut harness = ctx.harness(&config);
    for cycle in 1..=3 {
        let report = harness.reset_only().await;
        assert!(report.is_clean(), "cycle {} failed: {:?}", cycle, report.failure());
        // The stub logs its launch only after writing the backing store
        ctx.wait_for_lines("launches.log", cycle);
        assert!(ctx.file("DISKFILE").exists());
    }

    assert_eq!(ctx.lines("build.log"), vec!["absent"; 3]);
}

#[tokio::test]
async fn elapsed_excludes_reset_time() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    // A slow build must not show up in the benchmark timing
    config.build.build = sh(&[&format!("sleep 0.4\n{}", BUILD_SCRIPT)]);

    let scenario = ctx.scenario("sleep", "sleep.sh", "sleep 0.5\n");
    let mut harness = ctx.harness(&config);
    let results = harness.run(&[scenario]).await.unwrap();

    let elapsed = completed(&results[0]).elapsed_secs();
    assert!(elapsed >= 0.5, "elapsed {} shorter than the benchmark", elapsed);
    assert!(elapsed < 0.5 + 0.2, "elapsed {} includes reset time", elapsed);
}

#[tokio::test]
async fn report_contains_benchmark_output_verbatim() {
    let ctx = TestContext::new();
    colored::control::set_override(false);

    let scenario = ctx.scenario("SIMPLE TEST", "simple.sh", "printf 'RESULT=42\\n'\n");
    let mut harness = ctx.harness(&ctx.config());
    let results = harness.run(&[scenario]).await.unwrap();

    assert_eq!(completed(&results[0]).stdout, "RESULT=42\n");
}

#[tokio::test]
async fn emitted_block_has_label_time_and_output() {
    let ctx = TestContext::new();
    colored::control::set_override(false);

    let scenario = ctx.scenario("SIMPLE TEST", "simple.sh", "printf 'RESULT=42\\n'\n");
    let config = ctx.config();

    let mut buffer = Vec::new();
    {
        let mut harness = Harness::with_emitter(&config, ReportEmitter::new(&mut buffer)).unwrap();
        harness.run_one(&scenario).await.unwrap();
    }
    let text = String::from_utf8(buffer).unwrap();

    let label_at = text.find("SIMPLE TEST:").expect("label missing");
    let output_at = text.find("RESULT=42\n").expect("output missing");
    assert!(label_at < output_at);

    let time_line = text.lines().nth(2).expect("elapsed line missing");
    assert!(time_line.parse::<f64>().is_ok(), "not a duration: {:?}", time_line);
}

#[tokio::test]
async fn scenarios_are_independent() {
    let polluter = "mkdir -p mountdir/junk\necho garbage > DISKFILE\necho polluted\n";
    let observer = "ls -A mountdir | wc -l | tr -d ' '\n";

    let ctx_pair = TestContext::new();
    let a = ctx_pair.scenario("A", "a.sh", polluter);
    let b = ctx_pair.scenario("B", "b.sh", observer);
    let mut harness = ctx_pair.harness(&ctx_pair.config());
    let pair = harness.run(&[a, b]).await.unwrap();

    let ctx_alone = TestContext::new();
    let b = ctx_alone.scenario("B", "b.sh", observer);
    let mut harness = ctx_alone.harness(&ctx_alone.config());
    let alone = harness.run(&[b]).await.unwrap();

    assert_eq!(pair.len(), 2);
    assert_eq!(completed(&pair[0]).stdout, "polluted\n");
    assert_eq!(completed(&pair[1]).stdout, completed(&alone[0]).stdout);
    assert_eq!(completed(&alone[0]).stdout, "0\n");
}

#[tokio::test]
async fn build_failure_is_reported_and_run_continues() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.build.build = sh(&["echo 'rufs.c:12: error' >&2; exit 2"]);

    let first = ctx.scenario("first", "first.sh", "touch ran-first\n");
    let second = ctx.scenario("second", "second.sh", "touch ran-second\n");
    let mut harness = ctx.harness(&config);
    let results = harness.run(&[first, second]).await.unwrap();

    assert_eq!(results.len(), 2);
    for result in &results {
        match result {
            ScenarioResult::Failed { reason, outcome, .. } => {
                assert!(reason.starts_with("build:"), "reason: {}", reason);
                assert!(reason.contains("exit code 2"));
                assert!(reason.contains("rufs.c:12: error"));
                assert!(outcome.is_some(), "benchmark still runs after a reset failure");
            }
            ScenarioResult::Completed(_) => panic!("build failure must fail the scenario"),
        }
    }
    assert!(ctx.file("ran-first").exists());
    assert!(ctx.file("ran-second").exists());
}

#[tokio::test]
async fn mount_readiness_timeout_is_reported() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    // A plain directory never becomes a distinct mount
    config.mount.probe = ReadyProbe::Mounted;
    config.mount.ready_timeout_secs = 1;

    let scenario = ctx.scenario("timeout", "t.sh", "echo attempted\n");
    let mut harness = ctx.harness(&config);
    let results = harness.run(&[scenario]).await.unwrap();

    match &results[0] {
        ScenarioResult::Failed { reason, outcome, .. } => {
            assert!(reason.starts_with("mount:"), "reason: {}", reason);
            assert!(reason.contains("not ready after 1 seconds"));
            assert_eq!(outcome.as_ref().unwrap().stdout, "attempted\n");
        }
        ScenarioResult::Completed(_) => panic!("mount never became ready"),
    }
}

#[tokio::test]
async fn disabled_readiness_wait_does_not_poll() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.mount.probe = ReadyProbe::Mounted;
    config.mount.ready_timeout_secs = 0;

    let mut harness = ctx.harness(&config);
    let report = harness.reset_only().await;

    assert_eq!(report.outcome(STEP_MOUNT), Some(&StepOutcome::Succeeded));
}

#[tokio::test]
async fn benchmark_fault_keeps_output_and_run_continues() {
    let ctx = TestContext::new();
    let crash = ctx.scenario("crash", "crash.sh", "echo partial\necho 'segfault' >&2\nexit 139\n");
    let ok = ctx.scenario("ok", "ok.sh", "echo fine\n");

    let mut harness = ctx.harness(&ctx.config());
    let results = harness.run(&[crash, ok]).await.unwrap();

    match &results[0] {
        ScenarioResult::Failed { reason, outcome, .. } => {
            assert_eq!(reason, "benchmark exit code 139: segfault");
            assert_eq!(outcome.as_ref().unwrap().stdout, "partial\n");
        }
        ScenarioResult::Completed(_) => panic!("non-zero exit must fail the scenario"),
    }
    assert_eq!(completed(&results[1]).stdout, "fine\n");
}

#[tokio::test]
async fn clean_failure_is_tolerated() {
    let ctx = TestContext::new();
    let mut config = ctx.config();
    config.build.clean = sh(&["echo 'No rule to make target' >&2; exit 2"]);

    let mut harness = ctx.harness(&config);
    let report = harness.reset_only().await;

    assert!(report.outcome(STEP_CLEAN).unwrap().is_failed());
    assert!(report.is_clean());
}
