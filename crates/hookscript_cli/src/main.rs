//! Offline probe for hookscript extension directories.
//!
//! # Responsibility
//! - Load scripts the same way the attach library does and print which
//!   intercept points they would subscribe to.

use clap::{Parser, Subcommand};
use hookscript_core::{core_version, init_console_logging};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

mod check;

use check::{run_check, CheckOptions, Simulation};

/// hookscript extension probe
#[derive(Parser)]
#[command(name = "hookscript")]
#[command(about = "Inspect hookscript extension directories", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level for diagnostics written to stderr
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every script in a directory and report its subscriptions
    Check {
        /// Directory holding extension scripts
        script_dir: PathBuf,
        /// Script file extension
        #[arg(long, default_value = "rhai")]
        extension: String,
        /// Intercept point to probe (repeatable; defaults to the game points)
        #[arg(long = "hook")]
        hooks: Vec<String>,
        /// Fold VALUE through the subscribers of NAME
        #[arg(long, value_name = "NAME=VALUE")]
        simulate: Option<String>,
        /// Leading call argument for --simulate (repeatable)
        #[arg(long = "arg", requires = "simulate")]
        args: Vec<String>,
    },
    /// Print the core version
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_console_logging(&cli.log_level) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Commands::Check {
            script_dir,
            extension,
            hooks,
            simulate,
            args,
        } => {
            let simulate = match simulate
                .map(|request| Simulation::parse(&request, &args))
                .transpose()
            {
                Ok(simulate) => simulate,
                Err(err) => {
                    error!("event=check module=cli status=error error={err}");
                    eprintln!("{err}");
                    return ExitCode::FAILURE;
                }
            };
            let options = CheckOptions {
                script_dir,
                extension,
                hooks,
                simulate,
            };
            match run_check(&options) {
                Ok(report) => {
                    print!("{}", report.render());
                    if report.extensions().failures().is_empty() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Version => {
            println!("hookscript_core version={}", core_version());
            ExitCode::SUCCESS
        }
    }
}
