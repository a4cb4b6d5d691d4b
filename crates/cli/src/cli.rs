//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// rigsync - synchronized multi-camera capture and recording
#[derive(Parser, Debug)]
#[command(
    name = "rigsync",
    author,
    version,
    about = "Multi-camera frame synchronizer and recorder",
    long_about = "Pulls frames from several cameras at a common target rate, groups them \n\
                  into synchronized bundles and records one MJPEG AVI per camera plus \n\
                  a frame provenance table."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RIGSYNC_VERBOSE")]
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
        env = "RIGSYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the synchronizer and record a session
    Record(RecordArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),

    /// Summarize a recorded session folder
    Inspect(InspectArgs),
}

/// Arguments for the `record` command
#[derive(Parser, Debug, Clone)]
pub struct RecordArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "RIGSYNC_CONFIG")]
    pub config: PathBuf,

    /// Recording length in seconds (0 = until Ctrl+C or all cameras end)
    #[arg(long, default_value = "0", env = "RIGSYNC_DURATION")]
    pub duration: f64,

    /// Parent folder for the session (overrides recording.destination)
    #[arg(short, long, env = "RIGSYNC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Synchronize and log only, write nothing
    #[arg(long)]
    pub no_record: bool,

    /// Log one bundle summary every n bundles
    #[arg(long, default_value = "100")]
    pub log_every: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "RIGSYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `inspect` command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Session folder (holds port_<id>.avi and frame_time_history.csv)
    pub session: PathBuf,

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
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
