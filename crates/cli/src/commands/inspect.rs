//! `inspect` command implementation.

use anyhow::{Context, Result};
use session_io::SessionSummary;
use tracing::{info, warn};

use crate::cli::InspectArgs;

/// Execute the `inspect` command
pub fn run_inspect(args: &InspectArgs) -> Result<()> {
    info!(session = %args.session.display(), "Inspecting session");

    if !args.session.is_dir() {
        anyhow::bail!("Session folder not found: {}", args.session.display());
    }

    let summary = SessionSummary::load(&args.session)
        .with_context(|| format!("Failed to read session {}", args.session.display()))?;

    if !summary.is_consistent() {
        warn!("Videos and provenance table disagree");
    }

    if args.json {
        let json =
            serde_json::to_string_pretty(&summary).context("Failed to serialize session summary")?;
        println!("{}", json);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!("\n=== Session {} ===\n", summary.directory.display());
    println!("Bundles with frames: {}", summary.bundles);
    println!("Provenance rows: {}", summary.total_rows);
    if summary.orphan_rows > 0 {
        println!("Rows without a video: {}", summary.orphan_rows);
    }

    println!("\nVideos ({}):", summary.ports.len());
    for port in &summary.ports {
        let span = port
            .time_span
            .map(|(first, last)| format!(", {:.3}s span", last - first))
            .unwrap_or_default();
        println!(
            "  {} port {}: {}x{} @ {} fps, {} frames, {} rows{}",
            if port.is_consistent() { "✓" } else { "✗" },
            port.port,
            port.width,
            port.height,
            port.fps,
            port.video_frames,
            port.provenance_rows,
            span
        );
    }

    println!();
}
