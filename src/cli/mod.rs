//! CLI command handling
//!
//! Loads configuration, applies command-line overrides and dispatches to the
//! harness.

mod check;

use colored::Colorize;

use crate::bench::{Scenario, ScenarioResult};
use crate::commands::{Commands, GlobalArgs};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::executor::ProcessSpec;
use crate::harness::Harness;
use crate::reset::{ResetReport, StepOutcome};

/// Load configuration and apply command-line overrides
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = Config::load(global.config.as_deref())?;

    if let Some(workdir) = &global.workdir {
        config.workdir = workdir.clone();
    }
    if global.diagnostics {
        config.diagnostics = true;
    }

    Ok(config)
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, global: GlobalArgs) -> Result<()> {
    let config = load_config(&global)?;

    match command {
        Commands::Run { scenarios } => {
            let selected = config.select_scenarios(&scenarios)?;
            let mut harness = Harness::from_config(&config)?;
            let results = harness.run(&selected).await?;
            check_results(&results)
        }

        Commands::Reset => {
            let mut harness = Harness::from_config(&config)?;
            let report = harness.reset_only().await;
            print_reset_report(&report);

            match report.failure() {
                Some(failed) => Err(Error::ResetFailed {
                    step: failed.name.to_string(),
                    reason: failed.reason().unwrap_or("failed").to_string(),
                }),
                None => Ok(()),
            }
        }

        Commands::Bench {
            program,
            args,
            label,
        } => {
            let label = label.unwrap_or_else(|| program.clone());
            let scenario = Scenario::new(label, ProcessSpec::new(program).args(args));
            let mut harness = Harness::from_config(&config)?;
            let results = harness.run(std::slice::from_ref(&scenario)).await?;
            check_results(&results)
        }

        Commands::Check => check::run(&config),
    }
}

fn check_results(results: &[ScenarioResult]) -> Result<()> {
    let failed = results.iter().filter(|r| !r.is_completed()).count();
    if failed > 0 {
        return Err(Error::ScenariosFailed(failed));
    }
    Ok(())
}

fn print_reset_report(report: &ResetReport) {
    println!("{}", "Reset:".cyan());
    for record in &report.steps {
        let mark = match &record.outcome {
            StepOutcome::Succeeded => "✓".green(),
            StepOutcome::AlreadyClean => "-".dimmed(),
            StepOutcome::Failed(_) if !record.is_blocking() => "~".yellow(),
            StepOutcome::Failed(_) => "✗".red(),
        };
        println!("  {} {} ({})", mark, record.name, record.outcome.to_string().dimmed());
    }
}
