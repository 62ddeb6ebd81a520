//! CLI command definitions
//!
//! Defines the clap commands for the fsbench CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Options shared by every subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (default: ./fsbench.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Working directory holding the Makefile, mount point and backing store
    #[arg(long, global = true)]
    pub workdir: Option<PathBuf>,

    /// Echo the output of every intermediate command
    #[arg(long, global = true)]
    pub diagnostics: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reset the environment and run every configured scenario
    Run {
        /// Only run the scenario with this label (repeatable)
        #[arg(long = "scenario", short = 's')]
        scenarios: Vec<String>,
    },

    /// Run one reset cycle: unmount, clean, rebuild and remount
    Reset,

    /// Reset the environment and run a single benchmark executable
    Bench {
        /// Path to the benchmark executable
        program: String,

        /// Arguments to pass to the benchmark
        #[arg(last = true)]
        args: Vec<String>,

        /// Label printed above the report (default: program path)
        #[arg(long)]
        label: Option<String>,
    },

    /// Check that every configured program can be found
    Check,
}
