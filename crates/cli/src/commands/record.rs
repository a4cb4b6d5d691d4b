//! `record` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RecordArgs;
use crate::pipeline::{Session, SessionConfig, StopReason};

/// Execute the `record` command
pub async fn run_record(args: &RecordArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }
    if !(args.duration >= 0.0) || !args.duration.is_finite() {
        anyhow::bail!("--duration must be a non-negative number of seconds");
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        cameras = blueprint.cameras.len(),
        target_fps = blueprint.sync.target_fps,
        "Configuration loaded"
    );

    let output_root = if args.no_record {
        None
    } else {
        Some(
            args.output
                .clone()
                .unwrap_or_else(|| blueprint.recording.destination.clone()),
        )
    };

    let session = Session::new(SessionConfig {
        blueprint,
        duration: (args.duration > 0.0).then(|| Duration::from_secs_f64(args.duration)),
        output_root,
        log_every: args.log_every,
    });

    info!("Starting session...");
    let (stats, reason) = session
        .run(shutdown_signal())
        .await
        .context("Session failed")?;

    if reason == StopReason::Shutdown {
        warn!("Received shutdown signal, session stopped early");
    }
    stats.print_summary();

    info!("rigsync finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
