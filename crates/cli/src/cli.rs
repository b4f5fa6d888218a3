//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// airnode - sensing, uplink and actuation core for an air-quality node
#[derive(Parser, Debug)]
#[command(
    name = "airnode",
    author,
    version,
    about = "Air-quality sensor node runner",
    long_about = "Runs the node's concurrency core with simulated sensors.\n\n\
                  Producers sample on their own cadence, a dispatcher uplinks each \n\
                  complete round, and the particulate value drives the fan motor."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "AIRNODE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "AIRNODE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the node
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "node.toml", env = "AIRNODE_CONFIG")]
    pub config: PathBuf,

    /// Override node.device_id from configuration
    #[arg(long, env = "AIRNODE_DEVICE_ID")]
    pub device_id: Option<String>,

    /// Stop after this many dispatcher rounds (0 = unlimited)
    #[arg(long, default_value = "0", env = "AIRNODE_MAX_ROUNDS")]
    pub max_rounds: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "AIRNODE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "AIRNODE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "node.toml", env = "AIRNODE_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "node.toml", env = "AIRNODE_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_defaults() {
        let cli = Cli::try_parse_from(["airnode", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.max_rounds, 0);
        assert_eq!(args.metrics_port, 0);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_run_args_flags() {
        let cli = Cli::try_parse_from([
            "airnode",
            "-vv",
            "run",
            "--config",
            "x.toml",
            "--max-rounds",
            "3",
            "--timeout",
            "30",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("x.toml"));
        assert_eq!(args.max_rounds, 3);
        assert_eq!(args.timeout, 30);
        assert!(args.dry_run);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["airnode", "-q", "-v", "validate"]).is_err());
    }
}
