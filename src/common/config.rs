//! Configuration file handling
//!
//! Every field has a default, so an absent config file reproduces the stock
//! layout: `make`-built `./rufs` mounted single-threaded on `mountdir`, backed
//! by `DISKFILE`, with the two stock benchmark scenarios.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::paths;
use super::{Error, Result};
use crate::bench::Scenario;
use crate::executor::ProcessSpec;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Directory every command runs in and relative paths resolve against
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,

    /// Echo the captured output of every intermediate command
    #[serde(default)]
    pub diagnostics: bool,

    /// Mount point, backing store and readiness settings
    #[serde(default)]
    pub mount: MountConfig,

    /// Build system invocations
    #[serde(default)]
    pub build: BuildConfig,

    /// Filesystem service launch settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Benchmark scenarios, run in declaration order
    #[serde(default = "default_scenarios")]
    pub scenarios: Vec<ScenarioConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            diagnostics: false,
            mount: MountConfig::default(),
            build: BuildConfig::default(),
            service: ServiceConfig::default(),
            scenarios: default_scenarios(),
        }
    }
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

/// How readiness of a freshly launched mount is detected
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadyProbe {
    /// Mount point sits on a different device than its parent and lists
    #[default]
    Mounted,
    /// Root listing of the mount point succeeds
    Listable,
}

/// Mount point configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MountConfig {
    /// Mount point directory
    #[serde(default = "default_mount_dir")]
    pub dir: PathBuf,

    /// Backing store image written by the filesystem service
    #[serde(default = "default_backing_store")]
    pub backing_store: PathBuf,

    /// Unmount command; the mount point is appended as the last argument
    #[serde(default = "default_unmount")]
    pub unmount: Vec<String>,

    /// Readiness probe used after launching the service
    #[serde(default)]
    pub probe: ReadyProbe,

    /// Seconds to wait for the mount to become ready; 0 skips the wait
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            dir: default_mount_dir(),
            backing_store: default_backing_store(),
            unmount: default_unmount(),
            probe: ReadyProbe::default(),
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}

fn default_mount_dir() -> PathBuf {
    PathBuf::from("mountdir")
}
fn default_backing_store() -> PathBuf {
    PathBuf::from("DISKFILE")
}
fn default_unmount() -> Vec<String> {
    vec!["fusermount".to_string(), "-u".to_string()]
}
fn default_ready_timeout() -> u64 {
    5
}

/// Build system configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BuildConfig {
    /// Removes build artifacts; must succeed on an already-clean tree
    #[serde(default = "default_clean")]
    pub clean: Vec<String>,

    /// Builds the filesystem service executable
    #[serde(default = "default_build")]
    pub build: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            clean: default_clean(),
            build: default_build(),
        }
    }
}

fn default_clean() -> Vec<String> {
    vec!["make".to_string(), "clean".to_string()]
}
fn default_build() -> Vec<String> {
    vec!["make".to_string()]
}

/// Filesystem service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Build output to launch
    #[serde(default = "default_service_program")]
    pub program: String,

    /// Arguments placed before the mount point (`-s` runs single-threaded)
    #[serde(default = "default_service_args")]
    pub args: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            program: default_service_program(),
            args: default_service_args(),
        }
    }
}

fn default_service_program() -> String {
    "./rufs".to_string()
}
fn default_service_args() -> Vec<String> {
    vec!["-s".to_string()]
}

/// A benchmark scenario
#[derive(Debug, Deserialize, Clone)]
pub struct ScenarioConfig {
    /// Label printed above the scenario's report
    pub label: String,

    /// Benchmark executable
    pub program: String,

    /// Arguments passed to the benchmark
    #[serde(default)]
    pub args: Vec<String>,
}

impl ScenarioConfig {
    /// Convert into a runnable scenario
    pub fn to_scenario(&self) -> Scenario {
        Scenario {
            label: self.label.clone(),
            command: ProcessSpec::new(&self.program).args(self.args.iter().cloned()),
        }
    }
}

fn default_scenarios() -> Vec<ScenarioConfig> {
    vec![
        ScenarioConfig {
            label: "SIMPLE TEST".to_string(),
            program: "./benchmark/simple_test".to_string(),
            args: Vec::new(),
        },
        ScenarioConfig {
            label: "TEST CASE TEST".to_string(),
            program: "./benchmark/test_case".to_string(),
            args: Vec::new(),
        },
    ]
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise `./fsbench.toml` and then the
    /// per-user config file are tried, falling back to the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for path in paths::config_candidates() {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load and validate a specific configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the harness cannot run
    pub fn validate(&self) -> Result<()> {
        let commands = [
            ("mount.unmount", &self.mount.unmount),
            ("build.clean", &self.build.clean),
            ("build.build", &self.build.build),
        ];
        for (name, tokens) in commands {
            if tokens.first().map_or(true, |p| p.trim().is_empty()) {
                return Err(Error::Config(format!("'{}' must name a program", name)));
            }
        }

        if self.service.program.trim().is_empty() {
            return Err(Error::Config("'service.program' must not be empty".to_string()));
        }

        if self.scenarios.is_empty() {
            return Err(Error::Config("at least one scenario is required".to_string()));
        }

        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if scenario.program.trim().is_empty() {
                return Err(Error::Config(format!(
                    "scenario '{}' has no program",
                    scenario.label
                )));
            }
            if !seen.insert(scenario.label.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate scenario label '{}'",
                    scenario.label
                )));
            }
        }

        Ok(())
    }

    /// Absolute working directory
    pub fn resolved_workdir(&self) -> Result<PathBuf> {
        self.workdir.canonicalize().map_err(|e| {
            Error::Config(format!(
                "working directory '{}' is not accessible: {}",
                self.workdir.display(),
                e
            ))
        })
    }

    /// Select scenarios by label, keeping configured order
    ///
    /// An empty filter selects every scenario.
    pub fn select_scenarios(&self, labels: &[String]) -> Result<Vec<Scenario>> {
        if let Some(unknown) = labels
            .iter()
            .find(|l| !self.scenarios.iter().any(|s| &s.label == *l))
        {
            return Err(Error::UnknownScenario(unknown.clone()));
        }

        Ok(self
            .scenarios
            .iter()
            .filter(|s| labels.is_empty() || labels.contains(&s.label))
            .map(ScenarioConfig::to_scenario)
            .collect())
    }
}
