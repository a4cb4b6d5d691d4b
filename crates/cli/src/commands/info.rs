//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{RigBlueprint, SourceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    sync: SyncInfo,
    recording: RecordingInfo,
    cameras: Vec<CameraInfo>,
}

#[derive(Serialize)]
struct SyncInfo {
    target_fps: f64,
    alignment: String,
    delivery_capacity: usize,
    drop_policy: String,
}

#[derive(Serialize)]
struct RecordingInfo {
    destination: String,
    jpeg_quality: u8,
}

#[derive(Serialize)]
struct CameraInfo {
    port: u32,
    fps: f64,
    width: u32,
    height: u32,
    rotation_count: i32,
    source: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn describe_source(source: &SourceConfig) -> String {
    match source {
        SourceConfig::Mock {
            skip_every,
            fail_after,
            jitter_ms,
        } => {
            let mut parts = vec!["mock".to_string()];
            if let Some(n) = skip_every {
                parts.push(format!("skip every {n}"));
            }
            if let Some(n) = fail_after {
                parts.push(format!("fail after {n}"));
            }
            if *jitter_ms > 0.0 {
                parts.push(format!("jitter {jitter_ms} ms"));
            }
            parts.join(", ")
        }
        SourceConfig::Playback { directory, speed } => {
            format!("playback {} at {speed}x", directory.display())
        }
    }
}

fn build_config_info(blueprint: &RigBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        sync: SyncInfo {
            target_fps: blueprint.sync.target_fps,
            alignment: format!("{:?}", blueprint.sync.alignment),
            delivery_capacity: blueprint.sync.delivery_capacity,
            drop_policy: format!("{:?}", blueprint.sync.drop_policy),
        },
        recording: RecordingInfo {
            destination: blueprint.recording.destination.display().to_string(),
            jpeg_quality: blueprint.recording.jpeg_quality,
        },
        cameras: blueprint
            .cameras
            .iter()
            .map(|camera| CameraInfo {
                port: camera.port.port(),
                fps: camera.fps,
                width: camera.resolution[0],
                height: camera.resolution[1],
                rotation_count: camera.rotation_count,
                source: describe_source(&camera.source),
            })
            .collect(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Rig Configuration ===\n");
    println!("Version: {}", info.version);

    println!("\nSync:");
    println!("  Target fps: {}", info.sync.target_fps);
    println!("  Alignment: {}", info.sync.alignment);
    println!(
        "  Delivery: capacity {} ({})",
        info.sync.delivery_capacity, info.sync.drop_policy
    );

    println!("\nRecording:");
    println!("  Destination: {}", info.recording.destination);
    println!("  JPEG quality: {}", info.recording.jpeg_quality);

    println!("\nCameras ({}):", info.cameras.len());
    for camera in &info.cameras {
        println!(
            "  - port {}: {}x{} @ {} fps, rotation {} - {}",
            camera.port, camera.width, camera.height, camera.fps, camera.rotation_count, camera.source
        );
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_source() {
        let mock = SourceConfig::Mock {
            skip_every: Some(2),
            fail_after: None,
            jitter_ms: 1.5,
        };
        assert_eq!(describe_source(&mock), "mock, skip every 2, jitter 1.5 ms");
        assert_eq!(describe_source(&SourceConfig::default()), "mock");
    }

    #[test]
    fn test_build_config_info() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            r#"
[[cameras]]
port = 3
fps = 30.0
resolution = [320, 240]
rotation_count = -1
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let info = build_config_info(&blueprint);
        assert_eq!(info.cameras.len(), 1);
        assert_eq!(info.cameras[0].port, 3);
        assert_eq!(info.cameras[0].rotation_count, -1);
        assert_eq!(info.recording.jpeg_quality, 90);
    }
}
