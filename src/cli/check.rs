//! Preflight check of configured programs
//!
//! Tools looked up on PATH must be installed, except the unmount and clean
//! tools: those steps tolerate failure, so a missing one is only reported.
//! Programs given as paths (`./rufs`, `./benchmark/simple_test`) are usually
//! build outputs, so their absence is only reported too.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::common::config::Config;
use crate::common::{paths, Error, Result};

/// How a configured program resolved
#[derive(Debug, PartialEq, Eq)]
enum Resolution {
    Found(PathBuf),
    /// Path-like program that does not exist yet
    NotBuilt(PathBuf),
    /// Bare name not found on PATH
    Missing,
}

fn resolve(workdir: &Path, program: &str) -> Resolution {
    let path = Path::new(program);
    if path.components().count() > 1 || path.is_absolute() {
        let full = paths::resolve(workdir, path);
        if full.exists() {
            Resolution::Found(full)
        } else {
            Resolution::NotBuilt(full)
        }
    } else {
        match which::which(program) {
            Ok(found) => Resolution::Found(found),
            Err(_) => Resolution::Missing,
        }
    }
}

/// A configured program and the role it plays
#[derive(Debug)]
struct Program<'a> {
    role: String,
    program: &'a str,
    /// Whether a missing bare tool fails the check
    required: bool,
}

/// Every program the harness will run
fn programs(config: &Config) -> Vec<Program<'_>> {
    let mut list = Vec::new();
    let tools = [
        ("unmount", &config.mount.unmount, false),
        ("clean", &config.build.clean, false),
        ("build", &config.build.build, true),
    ];
    for (role, tokens, required) in tools {
        if let Some(program) = tokens.first() {
            list.push(Program {
                role: role.to_string(),
                program: program.as_str(),
                required,
            });
        }
    }
    list.push(Program {
        role: "service".to_string(),
        program: config.service.program.as_str(),
        required: true,
    });
    for scenario in &config.scenarios {
        list.push(Program {
            role: format!("scenario '{}'", scenario.label),
            program: scenario.program.as_str(),
            required: true,
        });
    }
    list
}

/// Print the resolution of every configured program
pub fn run(config: &Config) -> Result<()> {
    let workdir = config.resolved_workdir()?;
    let mut missing = Vec::new();

    println!("{} {}", "Workdir:".cyan(), workdir.display());
    for Program {
        role,
        program,
        required,
    } in programs(config)
    {
        match resolve(&workdir, program) {
            Resolution::Found(path) => {
                println!("  {} {}: {}", "✓".green(), role, path.display().to_string().dimmed())
            }
            Resolution::NotBuilt(path) => println!(
                "  {} {}: {} (not built yet)",
                "-".yellow(),
                role,
                path.display().to_string().dimmed()
            ),
            Resolution::Missing if required => {
                println!("  {} {}: {} not found on PATH", "✗".red(), role, program);
                missing.push(program.to_string());
            }
            Resolution::Missing => println!(
                "  {} {}: {} not found on PATH (step tolerates failure)",
                "✗".yellow(),
                role,
                program
            ),
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        missing.dedup();
        Err(Error::MissingPrograms(missing.join(", ")))
    }
}
