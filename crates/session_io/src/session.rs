//! Session directory layout and inspection

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use contracts::CameraId;
use serde::Serialize;
use tracing::warn;

use crate::{read_provenance, AviReader, StorageError};

/// Provenance table file name
pub const PROVENANCE_FILE: &str = "frame_time_history.csv";

/// Video file extension
pub const VIDEO_EXTENSION: &str = "avi";

/// `<dir>/port_<id>.avi`
pub fn video_path(dir: &Path, port: CameraId) -> PathBuf {
    dir.join(format!("{}.{VIDEO_EXTENSION}", port.file_stem()))
}

/// `<dir>/frame_time_history.csv`
pub fn provenance_path(dir: &Path) -> PathBuf {
    dir.join(PROVENANCE_FILE)
}

/// Per-camera view of a recorded session
#[derive(Debug, Clone, Serialize)]
pub struct PortSummary {
    pub port: CameraId,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub video_frames: usize,
    pub provenance_rows: usize,
    /// First and last recorded capture time
    pub time_span: Option<(f64, f64)>,
}

impl PortSummary {
    /// Video frame count agrees with the provenance table
    pub fn is_consistent(&self) -> bool {
        self.video_frames == self.provenance_rows
    }
}

/// Summary of a recorded session directory
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub directory: PathBuf,
    pub ports: Vec<PortSummary>,
    pub total_rows: usize,
    /// Distinct `sync_index` values in the table
    pub bundles: usize,
    /// Rows whose port has no video file
    pub orphan_rows: usize,
}

impl SessionSummary {
    /// Load every `port_<id>.avi` and the provenance table from `dir`
    pub fn load(dir: &Path) -> Result<Self, StorageError> {
        let rows = read_provenance(&provenance_path(dir))?;

        let mut ports = Vec::new();
        for (port, path) in discover_videos(dir)? {
            let reader = AviReader::open(&path)?;
            let info = *reader.info();
            let own: Vec<_> = rows.iter().filter(|r| r.port == port).collect();
            let time_span = own
                .first()
                .zip(own.last())
                .map(|(first, last)| (first.frame_time, last.frame_time));
            ports.push(PortSummary {
                port,
                path,
                width: info.width,
                height: info.height,
                fps: info.fps,
                video_frames: info.frame_count,
                provenance_rows: own.len(),
                time_span,
            });
        }

        let orphan_rows = rows
            .iter()
            .filter(|r| !ports.iter().any(|p| p.port == r.port))
            .count();
        let sync_indices: BTreeSet<u64> = rows.iter().map(|r| r.sync_index).collect();

        Ok(Self {
            directory: dir.to_path_buf(),
            ports,
            total_rows: rows.len(),
            bundles: sync_indices.len(),
            orphan_rows,
        })
    }

    /// Every port agrees with the table and no row is orphaned
    pub fn is_consistent(&self) -> bool {
        self.orphan_rows == 0 && self.ports.iter().all(PortSummary::is_consistent)
    }
}

/// `port_<id>.avi` files in `dir`, keyed by port
fn discover_videos(dir: &Path) -> Result<BTreeMap<CameraId, PathBuf>, StorageError> {
    let mut videos = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(VIDEO_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match stem.strip_prefix("port_").map(str::parse::<CameraId>) {
            Some(Ok(port)) => {
                videos.insert(port, path);
            }
            _ => warn!(path = %path.display(), "Skipping video with unrecognized name"),
        }
    }
    Ok(videos)
}
