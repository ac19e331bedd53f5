//! Force Flush CLI Application
//!
//! Command-line companion for the force-flush-hook library:
//! - Probe a built hook library by loading it into this process
//! - Print the hook's decision table for a detach policy
//! - Demonstrate output that is lost without a flush and kept with one
//! - Flush the stdout of a running process by loading the hook into it (Windows)

use anyhow::Result;
use clap::{Parser, Subcommand};
use force_flush_hook::{DetachPolicy, HookConfig};
use std::path::{Path, PathBuf};

mod config;
mod demo;
mod loader;
mod remote;
mod table;

use config::AppConfig;

/// Force Flush - flush a process's stdout from a load-time hook
#[derive(Parser, Debug)]
#[command(name = "force-flush")]
#[command(about = "Load, inspect and demonstrate the stdout flush hook", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a hook library into this process and report the outcome
    Probe {
        /// Hook library to load (default: next to this executable)
        #[arg(short, long, value_name = "FILE")]
        library: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the hook's decision for every lifecycle event
    Table {
        /// Detach policy: reject (literal) or accept (conventional)
        #[arg(short, long, value_name = "POLICY")]
        policy: Option<DetachPolicy>,
    },

    /// Show buffered output lost without the hook and kept with it
    Demo {
        /// Hook library to load in the second run
        #[arg(short, long, value_name = "FILE")]
        library: Option<PathBuf>,

        /// Line the child process writes
        #[arg(short, long, value_name = "TEXT")]
        message: Option<String>,

        /// Milliseconds the child holds before exiting
        #[arg(long, value_name = "MS")]
        hold_ms: Option<u64>,
    },

    /// Flush the stdout of a running process by loading the hook into it (Windows)
    Flush {
        /// Process ID of the target process
        #[arg(short, long, value_name = "PID")]
        pid: u32,

        /// Hook library to load into the target (default: next to this executable)
        #[arg(short, long, value_name = "FILE")]
        library: Option<PathBuf>,

        /// Give up waiting for the remote load after this many milliseconds
        #[arg(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Demo child process (internal)
    #[command(hide = true)]
    Chatter {
        #[arg(long)]
        library: Option<PathBuf>,

        #[arg(long)]
        message: String,

        #[arg(long, default_value_t = 0)]
        hold_ms: u64,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::debug!("Force Flush CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using hook library v{}", force_flush_hook::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    match args.command {
        Command::Probe { library, json } => {
            let path = resolve_library(library, &app_config)?;
            probe_mode(&path, json)
        }
        Command::Table { policy } => {
            let hook_config = match policy {
                Some(policy) => HookConfig::new().with_detach_policy(policy),
                None => app_config.hook.clone(),
            };
            print!("{}", table::render_table(&hook_config));
            Ok(())
        }
        Command::Demo {
            library,
            message,
            hold_ms,
        } => {
            let path = resolve_library(library, &app_config)?;
            let message = message.unwrap_or_else(|| app_config.demo.message.clone());
            let hold_ms = hold_ms.unwrap_or(app_config.demo.hold_ms);

            let report = demo::run_demo(&path, &message, hold_ms)?;
            print!("{}", report.render());
            Ok(())
        }
        Command::Flush {
            pid,
            library,
            timeout_ms,
            json,
        } => {
            let path = resolve_library(library, &app_config)?;
            flush_mode(pid, &path, timeout_ms, json)
        }
        Command::Chatter {
            library,
            message,
            hold_ms,
        } => demo::run_chatter(&message, library, hold_ms),
    }
}

/// Flag value, then config file, then the default location
fn resolve_library(flag: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    if let Some(path) = flag.or_else(|| config.library.path.clone()) {
        return Ok(path);
    }
    Ok(loader::default_library_path()?)
}

fn probe_mode(path: &Path, json: bool) -> Result<()> {
    let report = loader::probe(path);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }

    if !report.loaded {
        anyhow::bail!("Hook library was not loaded: {:?}", path);
    }
    Ok(())
}

fn flush_mode(pid: u32, path: &Path, timeout_ms: Option<u64>, json: bool) -> Result<()> {
    let report = remote::flush_process(pid, path, timeout_ms)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }

    if !report.flushed {
        anyhow::bail!("Hook library was not loaded into process {}", pid);
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args =
            Args::try_parse_from(["force-flush", "-vv", "table", "--policy", "accept"]).unwrap();
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Table { policy } => assert_eq!(policy, Some(DetachPolicy::Accept)),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Args::try_parse_from(["force-flush", "table", "--policy", "maybe"]).is_err());
    }

    #[test]
    fn test_flush_args_parse() {
        let args = Args::try_parse_from([
            "force-flush",
            "flush",
            "--pid",
            "4242",
            "--library",
            "hook.dll",
            "--timeout-ms",
            "2000",
        ])
        .unwrap();
        match args.command {
            Command::Flush {
                pid,
                library,
                timeout_ms,
                json,
            } => {
                assert_eq!(pid, 4242);
                assert_eq!(library, Some(PathBuf::from("hook.dll")));
                assert_eq!(timeout_ms, Some(2000));
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        // The target PID is required and must be a number
        assert!(Args::try_parse_from(["force-flush", "flush"]).is_err());
        assert!(Args::try_parse_from(["force-flush", "flush", "--pid", "self"]).is_err());
        assert!(Args::try_parse_from(["force-flush", "flush", "--pid", "-3"]).is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_flush_mode_reports_unsupported_platform() {
        let err = flush_mode(1, Path::new("hook.so"), None, false).unwrap_err();
        assert!(err.to_string().contains("only supported on Windows"));
    }

    #[test]
    fn test_library_resolution_order() {
        let mut config = AppConfig::default();
        config.library.path = Some(PathBuf::from("from-config.so"));

        let flag = resolve_library(Some(PathBuf::from("from-flag.so")), &config).unwrap();
        assert_eq!(flag, PathBuf::from("from-flag.so"));

        let file = resolve_library(None, &config).unwrap();
        assert_eq!(file, PathBuf::from("from-config.so"));
    }
}
