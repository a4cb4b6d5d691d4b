//! Recorded session playback
//!
//! Replays one camera of a session directory: frames come from
//! `port_<id>.avi`, timing from that port's rows of the provenance table.
//! Timestamps are re-based onto the playback clock so relative spacing
//! between cameras of the same session is preserved.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use contracts::{
    unix_seconds, CameraId, CameraProfile, CapturedFrame, ContractError, FrameCallback,
    FrameSource,
};
use session_io::{provenance_path, read_provenance, video_path, AviReader, ProvenanceRow};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};

/// Playback source for one camera
pub struct PlaybackSource {
    directory: PathBuf,
    profile: CameraProfile,
    speed: f64,
    /// Session-wide earliest frame time
    anchor: f64,
    rows: Arc<Vec<ProvenanceRow>>,
    reader: Mutex<Option<AviReader>>,
    listening: Arc<AtomicBool>,
}

impl PlaybackSource {
    /// Open a camera of a recorded session
    ///
    /// `speed` scales recorded intervals; `0` replays as fast as possible.
    pub fn open(directory: &Path, port: CameraId, speed: f64, rotation_count: i32) -> Result<Self> {
        let load = |source| IngestionError::PlaybackLoad { port, source };

        let reader = AviReader::open(video_path(directory, port)).map_err(load)?;
        let all_rows = read_provenance(&provenance_path(directory)).map_err(load)?;

        let anchor = all_rows
            .iter()
            .map(|r| r.frame_time)
            .fold(f64::INFINITY, f64::min);
        let mut rows: Vec<ProvenanceRow> = all_rows.into_iter().filter(|r| r.port == port).collect();

        if rows.len() != reader.frame_count() {
            warn!(
                port = %port,
                rows = rows.len(),
                frames = reader.frame_count(),
                "provenance and video disagree, replaying the shorter of the two"
            );
            rows.truncate(reader.frame_count());
        }
        if rows.is_empty() {
            return Err(IngestionError::PlaybackEmpty { port });
        }

        let info = *reader.info();
        info!(port = %port, frames = rows.len(), fps = info.fps, "playback session loaded");

        Ok(Self {
            directory: directory.to_path_buf(),
            profile: CameraProfile {
                port,
                fps: info.fps,
                width: info.width,
                height: info.height,
                rotation_count,
            },
            speed: speed.max(0.0),
            anchor,
            rows: Arc::new(rows),
            reader: Mutex::new(Some(reader)),
            listening: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Session directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Frames that will be replayed
    pub fn frame_count(&self) -> usize {
        self.rows.len()
    }
}

impl FrameSource for PlaybackSource {
    fn port(&self) -> CameraId {
        self.profile.port
    }

    fn profile(&self) -> CameraProfile {
        self.profile
    }

    fn listen(&self, callback: FrameCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        let port = self.profile.port;

        let reader = match self.reader.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(reader) = reader else {
            // a playback source replays once
            self.listening.store(false, Ordering::SeqCst);
            callback(Err(ContractError::source_disconnected(port, "playback already consumed")));
            return;
        };

        let rows = Arc::clone(&self.rows);
        let listening = Arc::clone(&self.listening);
        let speed = self.speed;
        let anchor = self.anchor;
        let on_spawn_error = Arc::clone(&callback);

        let spawned = std::thread::Builder::new()
            .name(format!("playback-{port}"))
            .spawn(move || {
                let started = Instant::now();
                let clock_origin = unix_seconds();
                let mut replayed = 0usize;

                for (index, row) in rows.iter().enumerate() {
                    if !listening.load(Ordering::Relaxed) {
                        break;
                    }

                    let offset = row.frame_time - anchor;
                    let scaled = if speed > 0.0 { offset / speed } else { offset };
                    if speed > 0.0 {
                        let due = started + Duration::from_secs_f64(scaled.max(0.0));
                        let now = Instant::now();
                        if due > now {
                            std::thread::sleep(due - now);
                        }
                    }

                    match reader.read_frame(index) {
                        Ok(image) => {
                            callback(Ok(CapturedFrame {
                                image,
                                timestamp: clock_origin + scaled,
                            }));
                            replayed += 1;
                        }
                        Err(e) => {
                            callback(Err(ContractError::source_disconnected(
                                port,
                                format!("playback frame {index} unreadable: {e}"),
                            )));
                            listening.store(false, Ordering::SeqCst);
                            return;
                        }
                    }
                }

                listening.store(false, Ordering::SeqCst);
                debug!(port = %port, replayed, "playback finished");
                callback(Err(ContractError::source_disconnected(port, "end of recording")));
            });

        if let Err(e) = spawned {
            self.listening.store(false, Ordering::SeqCst);
            on_spawn_error(Err(ContractError::source_disconnected(
                port,
                format!("failed to spawn playback thread: {e}"),
            )));
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ImageData, PixelFormat};
    use session_io::{write_provenance, AviParams, AviWriter};

    fn write_session(dir: &Path, port: CameraId, frames: u64) {
        let mut writer = AviWriter::create(
            video_path(dir, port),
            AviParams {
                width: 8,
                height: 4,
                fps: 20.0,
                jpeg_quality: 90,
            },
        )
        .unwrap();
        let mut rows = Vec::new();
        for i in 0..frames {
            writer
                .write_frame(&ImageData::new(8, 4, PixelFormat::Rgb8, vec![(i * 20) as u8; 96]))
                .unwrap();
            rows.push(ProvenanceRow {
                sync_index: i,
                port,
                frame_index: i + 10,
                frame_time: 100.0 + i as f64 * 0.05,
            });
        }
        writer.finish().unwrap();
        write_provenance(&provenance_path(dir), &rows).unwrap();
    }

    #[test]
    fn test_playback_replays_then_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let port = CameraId::new(2);
        write_session(dir.path(), port, 4);

        let source = PlaybackSource::open(dir.path(), port, 0.0, 1).unwrap();
        assert_eq!(source.frame_count(), 4);
        assert_eq!(source.profile().size(), (8, 4));
        assert_eq!(source.profile().rotation_count, 1);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        source.listen(Arc::new(move |e| sink.lock().unwrap().push(e)));
        std::thread::sleep(Duration::from_millis(200));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 5);
        let first = events[0].as_ref().unwrap();
        let second = events[1].as_ref().unwrap();
        assert!((second.timestamp - first.timestamp - 0.05).abs() < 1e-6);
        assert!(events[4].is_err());
        assert!(!source.is_listening());
    }

    #[test]
    fn test_missing_port_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_session(dir.path(), CameraId::new(0), 2);

        let err = PlaybackSource::open(dir.path(), CameraId::new(5), 1.0, 0).err().unwrap();
        assert!(matches!(err, IngestionError::PlaybackLoad { .. }));
    }
}
