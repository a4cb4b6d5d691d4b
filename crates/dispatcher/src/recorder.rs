//! Recorder
//!
//! `Idle → Recording → Draining → Idle`. While recording, a dedicated worker
//! consumes its own subscription and appends every present frame to the
//! camera's MJPEG AVI, remembering one provenance row per written frame. The
//! provenance table is persisted once when the session is stopped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{CameraId, CameraProfile, RecordingConfig, SyncBundle};
use session_io::{provenance_path, video_path, write_provenance, AviParams, AviWriter, ProvenanceRow};
use sync_engine::{Subscription, Synchronizer};

use crate::error::RecorderError;

/// Public view of the recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Draining,
}

/// One finalized video
#[derive(Debug, Clone, Serialize)]
pub struct RecordedVideo {
    pub path: PathBuf,
    pub frames: usize,
    /// Frames that could not be encoded or appended
    pub failed: u64,
}

/// What a finished session produced
#[derive(Debug, Clone, Serialize)]
pub struct RecordingSummary {
    pub destination: PathBuf,
    pub provenance: PathBuf,
    /// Bundles consumed
    pub bundles: u64,
    /// Provenance rows written
    pub rows: usize,
    pub videos: BTreeMap<CameraId, RecordedVideo>,
    /// Frames from cameras that had no writer (joined after start)
    pub ignored_frames: u64,
}

impl RecordingSummary {
    /// Frames written for `port`
    pub fn frames(&self, port: CameraId) -> usize {
        self.videos.get(&port).map_or(0, |video| video.frames)
    }
}

struct ActiveSession {
    destination: PathBuf,
    stop_tx: oneshot::Sender<()>,
    worker: JoinHandle<Result<RecordingSummary, RecorderError>>,
}

enum Slot {
    Idle,
    Recording(ActiveSession),
    Draining,
}

/// Records synchronized bundles to a session folder
pub struct Recorder {
    sync: Arc<Synchronizer>,
    jpeg_quality: u8,
    slot: Mutex<Slot>,
}

impl Recorder {
    pub fn new(sync: Arc<Synchronizer>, config: &RecordingConfig) -> Self {
        Self {
            sync,
            jpeg_quality: config.jpeg_quality,
            slot: Mutex::new(Slot::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state
    pub fn state(&self) -> RecorderState {
        match *self.lock() {
            Slot::Idle => RecorderState::Idle,
            Slot::Recording(_) => RecorderState::Recording,
            Slot::Draining => RecorderState::Draining,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Folder of the running session
    pub fn destination(&self) -> Option<PathBuf> {
        match &*self.lock() {
            Slot::Recording(session) => Some(session.destination.clone()),
            _ => None,
        }
    }

    /// Begin a session in `destination`
    ///
    /// Must be called from within a tokio runtime. Opens one writer per
    /// camera known to the synchronizer right now, then subscribes.
    ///
    /// # Errors
    /// - `AlreadyRecording` unless idle (the running session is untouched)
    /// - `DestinationUnwritable` when the folder cannot be created
    /// - `WriterOpen` when a video file cannot be created; files already
    ///   created for this session are removed
    #[instrument(name = "recorder_start", skip(self, destination), fields(destination = %destination.as_ref().display()))]
    pub fn start_recording(&self, destination: impl AsRef<Path>) -> Result<PathBuf, RecorderError> {
        let mut slot = self.lock();
        if !matches!(*slot, Slot::Idle) {
            return Err(RecorderError::AlreadyRecording);
        }

        let destination = destination.as_ref().to_path_buf();
        fs::create_dir_all(&destination).map_err(|source| RecorderError::DestinationUnwritable {
            path: destination.clone(),
            source,
        })?;

        let cameras = self.sync.cameras();
        if cameras.is_empty() {
            warn!("no cameras available, session will only hold the provenance table");
        }
        let writers = open_writers(&destination, &cameras, self.jpeg_quality)?;
        let subscription = self.sync.subscribe();
        let subscriber = subscription.id();

        let (stop_tx, stop_rx) = oneshot::channel();
        let session = RecordingSession::new(destination.clone(), writers);
        let worker = tokio::spawn(session.run(subscription, stop_rx));

        *slot = Slot::Recording(ActiveSession {
            destination: destination.clone(),
            stop_tx,
            worker,
        });
        metrics::gauge!("rigsync_recording").set(1.0);
        info!(cameras = cameras.len(), subscriber = %subscriber, "recording started");
        Ok(destination)
    }

    /// Start a session in a timestamped folder under `root`
    pub fn start_recording_in(&self, root: impl AsRef<Path>) -> Result<PathBuf, RecorderError> {
        self.start_recording(session_folder(root.as_ref()))
    }

    /// Finish the running session
    ///
    /// Everything already delivered is written, every video is finalized,
    /// then the provenance table is persisted. The recorder is idle again
    /// afterwards, whatever the outcome.
    ///
    /// # Errors
    /// - `NotRecording` unless recording
    /// - `ProvenanceWrite` / `Finalize` (videos are kept)
    /// - `WorkerPanicked`
    #[instrument(name = "recorder_stop", skip(self))]
    pub async fn stop_recording(&self) -> Result<RecordingSummary, RecorderError> {
        let session = {
            let mut slot = self.lock();
            match std::mem::replace(&mut *slot, Slot::Draining) {
                Slot::Recording(session) => session,
                other => {
                    *slot = other;
                    return Err(RecorderError::NotRecording);
                }
            }
        };
        let _idle = IdleOnDrop(self);
        debug!(destination = %session.destination.display(), "draining recording session");

        // Worker may already be gone after end-of-stream
        let _ = session.stop_tx.send(());
        let result = match session.worker.await {
            Ok(result) => result,
            Err(e) => Err(RecorderError::WorkerPanicked(e.to_string())),
        };

        match &result {
            Ok(summary) => info!(
                destination = %summary.destination.display(),
                bundles = summary.bundles,
                rows = summary.rows,
                "recording stopped"
            ),
            Err(e) => error!(error = %e, "recording stopped with error"),
        }
        result
    }
}

/// Returns the recorder to idle even if the stop future is dropped
struct IdleOnDrop<'a>(&'a Recorder);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        *self.0.lock() = Slot::Idle;
        metrics::gauge!("rigsync_recording").set(0.0);
    }
}

/// `<root>/recording_YYYYmmdd_HHMMSS`
pub fn session_folder(root: &Path) -> PathBuf {
    root.join(Local::now().format("recording_%Y%m%d_%H%M%S").to_string())
}

fn open_writers(
    destination: &Path,
    cameras: &[CameraProfile],
    jpeg_quality: u8,
) -> Result<BTreeMap<CameraId, AviWriter>, RecorderError> {
    let mut writers = BTreeMap::new();
    for profile in cameras {
        let path = video_path(destination, profile.port);
        match AviWriter::create(&path, AviParams::from_profile(profile, jpeg_quality)) {
            Ok(writer) => {
                writers.insert(profile.port, writer);
            }
            Err(source) => {
                error!(port = %profile.port, path = %path.display(), error = %source, "cannot open video writer");
                discard_writers(writers);
                return Err(RecorderError::WriterOpen {
                    port: profile.port,
                    source,
                });
            }
        }
    }
    Ok(writers)
}

fn discard_writers(writers: BTreeMap<CameraId, AviWriter>) {
    for (port, writer) in writers {
        let path = writer.path().to_path_buf();
        drop(writer);
        if let Err(e) = fs::remove_file(&path) {
            warn!(port = %port, path = %path.display(), error = %e, "cannot remove partial video");
        }
    }
}

/// State owned by the recording worker
struct RecordingSession {
    destination: PathBuf,
    writers: BTreeMap<CameraId, AviWriter>,
    failed: BTreeMap<CameraId, u64>,
    rows: Vec<ProvenanceRow>,
    bundles: u64,
    ignored_frames: u64,
}

impl RecordingSession {
    fn new(destination: PathBuf, writers: BTreeMap<CameraId, AviWriter>) -> Self {
        Self {
            destination,
            writers,
            failed: BTreeMap::new(),
            rows: Vec::new(),
            bundles: 0,
            ignored_frames: 0,
        }
    }

    #[instrument(
        name = "recording_worker",
        skip_all,
        fields(destination = %self.destination.display(), subscriber = %subscription.id())
    )]
    async fn run(
        mut self,
        mut subscription: Subscription,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> Result<RecordingSummary, RecorderError> {
        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                next = subscription.recv() => match next {
                    Some(bundle) => self.write_bundle(&bundle),
                    None => {
                        debug!("subscription closed, waiting for stop");
                        break;
                    }
                },
            }
        }

        while let Ok(bundle) = subscription.try_recv() {
            self.write_bundle(&bundle);
        }

        let result = self.finish();
        subscription.detach();
        result
    }

    fn write_bundle(&mut self, bundle: &SyncBundle) {
        self.bundles += 1;
        for record in bundle.present() {
            let Some(writer) = self.writers.get_mut(&record.port) else {
                self.ignored_frames += 1;
                continue;
            };
            match writer.write_frame(&record.frame) {
                Ok(()) => {
                    self.rows.push(ProvenanceRow {
                        sync_index: bundle.sync_index,
                        port: record.port,
                        frame_index: record.frame_index,
                        frame_time: record.capture_timestamp,
                    });
                    metrics::counter!("rigsync_recorded_frames_total", "port" => record.port.to_string())
                        .increment(1);
                }
                Err(e) => {
                    *self.failed.entry(record.port).or_default() += 1;
                    metrics::counter!("rigsync_record_failures_total", "port" => record.port.to_string())
                        .increment(1);
                    error!(
                        port = %record.port,
                        sync_index = bundle.sync_index,
                        frame_index = record.frame_index,
                        error = %e,
                        "frame not recorded"
                    );
                }
            }
        }

        if self.bundles % 100 == 0 {
            debug!(bundles = self.bundles, rows = self.rows.len(), "recording progress");
        }
    }

    fn finish(self) -> Result<RecordingSummary, RecorderError> {
        let Self {
            destination,
            writers,
            failed,
            rows,
            bundles,
            ignored_frames,
        } = self;

        let mut finalize_error = None;
        let mut videos = BTreeMap::new();
        for (port, writer) in writers {
            let path = writer.path().to_path_buf();
            match writer.finish() {
                Ok(info) => {
                    videos.insert(
                        port,
                        RecordedVideo {
                            path,
                            frames: info.frame_count,
                            failed: failed.get(&port).copied().unwrap_or(0),
                        },
                    );
                }
                Err(source) => {
                    error!(port = %port, path = %path.display(), error = %source, "cannot finalize video");
                    finalize_error.get_or_insert(RecorderError::Finalize { port, source });
                }
            }
        }

        let provenance = provenance_path(&destination);
        if let Err(source) = write_provenance(&provenance, &rows) {
            error!(path = %provenance.display(), error = %source, "cannot write provenance table");
            return Err(RecorderError::ProvenanceWrite {
                path: provenance,
                source,
            });
        }
        if let Some(e) = finalize_error {
            return Err(e);
        }

        Ok(RecordingSummary {
            destination,
            provenance,
            bundles,
            rows: rows.len(),
            videos,
            ignored_frames,
        })
    }
}
