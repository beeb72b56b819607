//! lockscope command-line interface
//!
//! Drives a synthetic lock workload against an in-process lock manager and
//! prints the size-bounded diagnostic reports.
//!
//! # Usage
//!
//! ```bash
//! # One transaction holding 10,000 locks on 8 KiB keys
//! lockscope live --locks 10000 --key-size 8192
//!
//! # 700 transactions queued behind one 31 KiB key, as JSON
//! lockscope -o json pending --waiters 700 --key-size 31744
//!
//! # Zero byte budget
//! lockscope live --limit 0
//!
//! # Write the default configuration
//! lockscope init-config lockscope.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lockscope_txn::TransactionManager;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod formatter;
mod workload;

use config::CliConfig;
use formatter::OutputFormat;

/// lockscope command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "lockscope",
    author = "Lockscope Team",
    version,
    about = "Inspect live transactions and pending lock requests",
    long_about = "Builds a synthetic lock workload and prints the showLiveTransactions and\n\
                  showPendingLockRequests reports, truncated to the configured byte limit."
)]
struct Args {
    /// Configuration file path
    #[arg(long, value_name = "FILE", env = "LOCKSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format (defaults to the config file setting)
    #[arg(short = 'o', long, value_enum)]
    output: Option<OutputFormatArg>,

    /// Log filter, e.g. "info" or "lockscope_txn=debug"
    #[arg(long, env = "LOCKSCOPE_LOG")]
    log_level: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Override the lock wait timeout in milliseconds
    #[arg(long, env = "LOCKSCOPE_WAIT_TIMEOUT_MS")]
    wait_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show active transactions and their row locks
    Live {
        /// Number of transactions to start
        #[arg(long, default_value_t = 1)]
        txns: usize,

        /// Locks held by each transaction
        #[arg(long, default_value_t = 10_000)]
        locks: usize,

        /// Size of each key in bytes
        #[arg(long, default_value_t = 8 * 1024)]
        key_size: usize,

        /// Response byte limit (defaults to the configured limit)
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Show queued lock requests
    Pending {
        /// Number of transactions queued behind the holder
        #[arg(long, default_value_t = 700)]
        waiters: usize,

        /// Size of the contended key in bytes
        #[arg(long, default_value_t = 31 * 1024)]
        key_size: usize,

        /// Response byte limit (defaults to the configured limit)
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Write the effective configuration to a file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

/// Output format argument
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    /// Display results in a formatted table
    Table,
    /// Display results as JSON
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.log_level.as_deref(), args.verbose);

    // Load configuration
    let config = load_config(&args)?;
    let format = match args.output {
        Some(arg) => arg.into(),
        None => OutputFormat::from_name(&config.output_format)?,
    };

    match &args.command {
        Command::InitConfig { path } => {
            config.save(path)?;
            info!(path = %path.display(), "configuration written");
            Ok(())
        }
        Command::Live {
            txns,
            locks,
            key_size,
            limit,
        } => {
            let tm = TransactionManager::with_config(config.engine.clone())?;
            workload::hold_row_locks(&tm, *txns, *locks, *key_size)?;
            let report = tm
                .show_live_transactions(*limit)
                .context("showLiveTransactions failed")?;
            println!("{}", formatter::format_live(&report, format)?);
            Ok(())
        }
        Command::Pending {
            waiters,
            key_size,
            limit,
        } => {
            let tm = TransactionManager::with_config(config.engine.clone())?;
            workload::queue_waiters(&tm, *waiters, *key_size)?;
            let report = tm
                .show_pending_lock_requests(*limit)
                .context("showPendingLockRequests failed")?;
            println!("{}", formatter::format_pending(&report, format)?);
            Ok(())
        }
    }
}

fn init_logging(log_level: Option<&str>, verbose: bool) {
    let filter = match log_level {
        Some(directives) => EnvFilter::new(directives),
        None if verbose => EnvFilter::new("lockscope=debug,lockscope_txn=debug"),
        None => EnvFilter::new("lockscope=warn,lockscope_txn=warn"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<CliConfig> {
    let mut config = match &args.config {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };

    // Override with command line arguments
    if let Some(timeout) = args.wait_timeout_ms {
        config.engine.lock.wait_timeout_ms = Some(timeout);
    }
    config.validate()?;

    debug!(?config, "configuration loaded");
    Ok(config)
}
