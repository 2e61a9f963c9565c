//! Command-line interface module for sortwatch.
//!
//! This module handles all CLI-related functionality including:
//! - Command parsing
//! - Configuration loading and command-line overrides
//! - The destination folder check
//! - Running a monitoring session until Ctrl-C

use crate::config::{Config, SorterConfig};
use crate::events::{EventReceiver, LogEvent, event_channel};
use crate::output::OutputFormatter;
use crate::watcher::Monitor;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Watch a folder and sort new files into destination folders by extension.
#[derive(Debug, Parser)]
#[command(name = "sortwatch", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Watch the directory and sort files as they arrive
    Watch {
        /// Directory to watch instead of the configured one
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Settle delay in milliseconds before a new file is handled
        #[arg(long)]
        settle_ms: Option<u64>,

        /// Print events as JSON lines instead of colored text
        #[arg(long)]
        json: bool,
    },
    /// Report which destination folders exist
    Check,
    /// Print the effective configuration as TOML
    Config,
}

/// Runs the CLI application with the parsed arguments.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use sortwatch::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["sortwatch", "check"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {:#}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("Error loading configuration")?;

    match cli.command {
        Command::Watch {
            dir,
            settle_ms,
            json,
        } => {
            let config = apply_overrides(config, dir, settle_ms);
            let compiled = config.compile().context("Invalid configuration")?;
            watch_directory(&compiled, json)
        }
        Command::Check => {
            let compiled = config.compile().context("Invalid configuration")?;
            check_folders(&compiled);
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

/// Applies command-line overrides on top of the loaded configuration.
pub fn apply_overrides(mut config: Config, dir: Option<PathBuf>, settle_ms: Option<u64>) -> Config {
    if let Some(dir) = dir {
        config.watch_directory = dir;
    }
    if let Some(settle_ms) = settle_ms {
        config.settle_delay_ms = settle_ms;
    }
    config
}

/// Folder existence for the watch directory and every rule destination.
pub fn folder_report(config: &SorterConfig) -> Vec<(PathBuf, bool)> {
    std::iter::once(config.watch_dir.as_path())
        .chain(config.rules.rules().iter().map(|r| r.destination.as_path()))
        .map(|path: &Path| (path.to_path_buf(), path.is_dir()))
        .collect()
}

/// Prints the startup folder check.
pub fn check_folders(config: &SorterConfig) {
    OutputFormatter::header("Checking folders...");
    for (path, exists) in folder_report(config) {
        OutputFormatter::folder_status(&path, exists);
    }
    if config.rules.is_empty() {
        OutputFormatter::warning("No sorting rules configured; every file will stay in place");
    }
}

/// Monitors the configured directory until Ctrl-C.
///
/// This function:
/// 1. Prints the folder check (text mode only)
/// 2. Starts the monitor; a missing watch directory aborts here
/// 3. Renders events as they arrive, with live counters
/// 4. On Ctrl-C, stops the monitor and prints a summary
pub fn watch_directory(config: &SorterConfig, json: bool) -> Result<()> {
    let (sender, receiver) = event_channel();
    let monitor = Monitor::new(sender);

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install Ctrl-C handler")?;

    if !json {
        check_folders(config);
        println!();
    }

    if let Err(e) = monitor.start(config) {
        render_pending(&receiver, json, None);
        return Err(e).context("Could not start monitoring");
    }

    if !json {
        OutputFormatter::info("Press Ctrl-C to stop");
    }
    let spinner = (!json).then(OutputFormatter::create_spinner);
    let stats = monitor.stats();

    while stop_rx.try_recv().is_err() {
        if let Some(event) = receiver.recv_timeout(Duration::from_millis(200)) {
            render(&event, json, spinner.as_ref());
        }
        if let Some(spinner) = &spinner {
            spinner.set_message(OutputFormatter::stats_line(&stats.snapshot()));
        }
    }

    monitor.stop();
    render_pending(&receiver, json, spinner.as_ref());
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
        OutputFormatter::summary_table(&stats.snapshot());
    }

    Ok(())
}

fn render_pending(receiver: &EventReceiver, json: bool, spinner: Option<&ProgressBar>) {
    for event in receiver.drain() {
        render(&event, json, spinner);
    }
}

fn render(event: &LogEvent, json: bool, spinner: Option<&ProgressBar>) {
    let line = if json {
        OutputFormatter::event_json(event)
    } else {
        OutputFormatter::event_line(event)
    };
    match spinner {
        Some(spinner) => spinner.println(line),
        None => println!("{}", line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_watch_command() {
        let cli = Cli::parse_from([
            "sortwatch",
            "--config",
            "/etc/sortwatch.toml",
            "watch",
            "--dir",
            "/tmp/in",
            "--settle-ms",
            "250",
            "--json",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("/etc/sortwatch.toml")));
        match cli.command {
            Command::Watch {
                dir,
                settle_ms,
                json,
            } => {
                assert_eq!(dir, Some(PathBuf::from("/tmp/in")));
                assert_eq!(settle_ms, Some(250));
                assert!(json);
            }
            other => panic!("Unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["sortwatch", "check", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Check));
    }

    #[test]
    fn test_apply_overrides() {
        let config = apply_overrides(Config::default(), Some(PathBuf::from("/in")), Some(10));
        assert_eq!(config.watch_directory, PathBuf::from("/in"));
        assert_eq!(config.settle_delay_ms, 10);

        let untouched = apply_overrides(Config::default(), None, None);
        assert_eq!(untouched, Config::default());
    }

    #[test]
    fn test_folder_report() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let pictures = temp_dir.path().join("Pictures");
        std::fs::create_dir(&pictures).expect("Failed to create directory");

        let config = Config {
            watch_directory: temp_dir.path().to_path_buf(),
            rules: vec![
                crate::config::RuleConfig {
                    extensions: vec![".jpg".into()],
                    destination: pictures.clone(),
                },
                crate::config::RuleConfig {
                    extensions: vec![".mp4".into()],
                    destination: temp_dir.path().join("Videos"),
                },
            ],
            ..Config::default()
        };
        let report = folder_report(&config.compile().expect("Failed to compile"));

        assert_eq!(
            report,
            vec![
                (temp_dir.path().to_path_buf(), true),
                (pictures, true),
                (temp_dir.path().join("Videos"), false),
            ]
        );
    }
}
