//! Remote Build Proxy
//!
//! Installed under the names `cmake` and `conan` (see `rbp shims install`),
//! it forwards each invocation to the configured build host. Invoked as
//! `rbp`, it offers a small management CLI.

#![forbid(unsafe_code)]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rbp_common::command::Tool;
use rbp_common::RemotingError;
use std::path::PathBuf;
use tracing::debug;

/// Exit code for classification, validation and configuration failures.
const EXIT_USAGE: i32 = 2;

#[derive(Parser)]
#[command(name = "rbp")]
#[command(author, version, about = "Remote Build Proxy - run cmake and conan on a remote build host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Proxy a cmake or conan invocation explicitly
    Run {
        /// Tool to run (cmake or conan)
        tool: String,

        /// Arguments passed to the tool
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Show what an invocation would do, without contacting the build host
    Classify {
        /// Tool to classify (cmake or conan)
        tool: String,

        /// Arguments passed to the tool
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage cmake/conan shims
    Shims {
        #[command(subcommand)]
        action: ShimsAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

#[derive(Subcommand)]
enum ShimsAction {
    /// Link cmake and conan to this binary in a directory
    Install {
        /// Target directory, usually early on PATH
        dir: PathBuf,

        /// Replace existing files
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let invoked_as = argv
        .first()
        .map(|arg0| commands::program_name(arg0))
        .unwrap_or_default();

    let result = if Tool::from_name(&invoked_as).is_some() {
        commands::proxy(argv)
    } else {
        run_cli(Cli::parse())
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("rbp: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn run_cli(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run { tool, args } => {
            let loaded = commands::load_config()?;
            commands::init_cli_logging(&loaded.config, cli.verbose)?;
            debug!(%tool, ?args, "explicit run");
            commands::run_tool(&loaded.config, tool, args)
        }
        Commands::Classify { tool, args, json } => {
            let loaded = commands::load_config()?;
            commands::init_cli_logging(&loaded.config, cli.verbose)?;
            commands::classify(&loaded.config, tool, args, json)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(),
            ConfigAction::Path => commands::config_path(),
        },
        Commands::Shims { action } => match action {
            ShimsAction::Install { dir, force } => commands::shims_install(&dir, force),
        },
    }
}

/// Map a failure to the process exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<RemotingError>() {
        Some(_) => EXIT_USAGE,
        None => 1,
    }
}
