//! fsbench - reset-and-benchmark harness for user-space filesystems
//!
//! Resets the filesystem service to a clean build and fresh mount before
//! each benchmark, then prints timing and raw benchmark output.

use clap::Parser;
use fsbench::cli;
use fsbench::commands::{Commands, GlobalArgs};
use fsbench::common::logging;

#[derive(Parser)]
#[command(name = "fsbench", about = "Reset-and-benchmark harness for FUSE filesystems")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.global.verbose);

    if cli.global.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = cli::dispatch(cli.command, cli.global).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
