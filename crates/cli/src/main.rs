//! harbinger: watch a Git repository for remote changes and merge conflicts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humantime_serde::re::humantime;
use tracing::error;

use harbinger::commands::monitor::{self, MonitorArgs};
use harbinger::commands::{logs, resolve, status, stop, test};
use harbinger::{daemon, logging};
use harbinger_core::HarbingerConfig;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Background Git monitor with interactive conflict resolution.
#[derive(Parser, Debug)]
#[command(
    name = "harbinger",
    version,
    about = "Notifies you when your branch falls behind or would conflict with its remote"
)]
struct Cli {
    /// Path to the YAML configuration file (default: ~/.harbinger.yaml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch a repository and report divergence and predicted conflicts.
    Monitor {
        /// Polling interval such as `30s` or `2m` (overrides the config).
        #[arg(short, long, value_parser = parse_interval)]
        interval: Option<Duration>,

        /// Repository to monitor.
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Remote branch to compare against instead of the current branch.
        #[arg(short, long)]
        branch: Option<String>,

        /// Run in the background.
        #[arg(short, long)]
        detach: bool,
    },

    /// Resolve the conflicts of an in-progress merge interactively.
    Resolve {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Fetch and show how the current branch compares with its remote.
    Status {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Remote branch to compare against instead of the current branch.
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// List or stop background monitors.
    Stop {
        /// PID of the monitor to stop.
        pid: Option<u32>,

        /// Stop every running monitor.
        #[arg(short, long)]
        all: bool,
    },

    /// List log files, or print the log of one background monitor.
    Logs {
        pid: Option<u32>,
    },

    /// Check that notifications and terminal rendering work here.
    Test {
        /// Only test notifications.
        #[arg(short, long)]
        notifications: bool,

        /// Only test terminal rendering.
        #[arg(short, long)]
        ui: bool,
    },
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    let interval = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".into());
    }
    Ok(interval)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli { config, command } = cli;
    let config_path = config.as_deref();

    match command {
        Commands::Monitor {
            interval,
            path,
            branch,
            detach,
        } => {
            let args = MonitorArgs {
                interval,
                path,
                branch,
                detach,
            };
            run_monitor(config_path, args).await
        }
        Commands::Resolve { path } => {
            let config = load_config(config_path)?;
            logging::init_terminal("warn");
            resolve::run(&config, &path)
        }
        Commands::Status { path, branch } => {
            let config = load_config(config_path)?;
            logging::init_terminal("warn");
            status::run(&config, &path, branch.as_deref())
        }
        Commands::Stop { pid, all } => {
            logging::init_terminal("warn");
            stop::run(pid, all)
        }
        Commands::Logs { pid } => {
            logging::init_terminal("warn");
            logs::run(pid)
        }
        Commands::Test { notifications, ui } => {
            logging::init_terminal("warn");
            test::run(notifications, ui)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<HarbingerConfig> {
    HarbingerConfig::load_or_init(path).context("failed to load configuration")
}

/// A detached child has no terminal, so it logs to its own file and records
/// fatal errors there too.
async fn run_monitor(config_path: Option<&Path>, args: MonitorArgs) -> Result<()> {
    let loaded = load_config(config_path);
    let level = loaded
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    if !monitor::is_detached_child() {
        logging::init_terminal(&level);
        return monitor::run(loaded?, args, config_path).await;
    }

    let log = daemon::log_file_path(&daemon::state_dir()?, std::process::id());
    let _guard = logging::init_file(&log, &level)?;
    let result = match loaded {
        Ok(config) => monitor::run(config, args, config_path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "monitor exited with an error");
    }
    result
}
