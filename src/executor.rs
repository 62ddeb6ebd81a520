//! Command executor
//!
//! Runs one external process per call, blocking the harness until it exits.
//! A non-zero exit status is data, not an error: callers decide what a
//! failure means. Only a failure to spawn at all is reported as `Err`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};

use crate::common::{Error, Result};

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build from a token list: program first, then arguments
    pub fn from_tokens(tokens: &[String]) -> Result<Self> {
        let (program, args) = tokens.split_first().ok_or(Error::EmptyCommand)?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a completed process
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, `None` if terminated by a signal
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Human-readable exit status
    pub fn describe_status(&self) -> String {
        describe_status(&self.status)
    }

    /// Last non-empty stderr line, for short failure reasons
    pub fn stderr_excerpt(&self) -> Option<&str> {
        self.stderr.lines().rev().map(str::trim).find(|l| !l.is_empty())
    }
}

/// Human-readable exit status ("exit code 2", "killed by signal 9")
pub fn describe_status(status: &ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {}", code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("killed by signal {}", signal);
        }
    }

    "unknown exit status".to_string()
}

/// Spawns processes inside the harness working directory
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    workdir: PathBuf,
    diagnostics: bool,
}

impl CommandExecutor {
    /// `diagnostics` enables echoing of captured output from [`run`](Self::run)
    pub fn new(workdir: impl Into<PathBuf>, diagnostics: bool) -> Self {
        Self {
            workdir: workdir.into(),
            diagnostics,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    /// Resolve a program path
    ///
    /// Relative paths with a directory component (`./rufs`) are taken relative
    /// to the working directory; bare names are left for PATH lookup.
    fn resolve_program(&self, program: &str) -> PathBuf {
        let path = Path::new(program);
        if path.is_relative() && path.components().count() > 1 {
            self.workdir.join(path)
        } else {
            path.to_path_buf()
        }
    }

    fn command(&self, spec: &ProcessSpec) -> Command {
        let mut cmd = Command::new(self.resolve_program(&spec.program));
        cmd.args(&spec.args).current_dir(&self.workdir);
        cmd
    }

    /// Run to completion and capture both output streams
    pub async fn capture(&self, spec: &ProcessSpec) -> Result<ExecutionResult> {
        tracing::debug!("Running: {}", spec);

        let output = self
            .command(spec)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::spawn(&spec.program, e))?;

        Ok(ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status,
        })
    }

    /// Run an intermediate command, echoing its output in diagnostic mode
    pub async fn run(&self, spec: &ProcessSpec) -> Result<ExecutionResult> {
        let result = self.capture(spec).await?;

        tracing::debug!("'{}' finished with {}", spec, result.describe_status());

        if self.diagnostics {
            println!("$ {}", spec);
            print!("{}", result.stdout);
            if !result.stderr.is_empty() {
                eprint!("{}", result.stderr);
            }
            if !result.success() {
                println!("({})", result.describe_status());
            }
        }

        Ok(result)
    }

    /// Spawn without waiting, detached into its own process group
    ///
    /// The returned handle lets the caller notice an early exit; dropping it
    /// leaves the process running.
    pub fn launch_detached(&self, spec: &ProcessSpec) -> Result<Child> {
        tracing::debug!("Launching detached: {}", spec);

        let mut cmd = self.command(spec);
        cmd.stdin(Stdio::null());

        if self.diagnostics {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|e| Error::spawn(&spec.program, e))
    }
}
