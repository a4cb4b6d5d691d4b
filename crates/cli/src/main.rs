//! # rigsync CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 同步 / 录制会话编排
//! - 已录制会话检查
//! - 优雅关闭处理

mod cli;
mod commands;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_inspect, run_record, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(observability_config(&cli))?;

    info!(version = env!("CARGO_PKG_VERSION"), "rigsync starting");

    let result = match &cli.command {
        Commands::Record(args) => run_record(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
        Commands::Inspect(args) => run_inspect(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Logging level, format and metrics endpoint from CLI options
fn observability_config(cli: &Cli) -> ObservabilityConfig {
    let (default_log_level, respect_env) = if cli.quiet {
        ("warn", false)
    } else {
        match cli.verbose {
            0 => ("info", true),
            1 => ("debug", true),
            _ => ("trace", true),
        }
    };

    let metrics_port = match &cli.command {
        Commands::Record(args) if args.metrics_port != 0 => Some(args.metrics_port),
        _ => None,
    };

    ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port,
        default_log_level: default_log_level.to_string(),
        respect_env,
    }
}
