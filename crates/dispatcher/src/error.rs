//! Recorder error types

use std::path::PathBuf;

use contracts::CameraId;
use session_io::StorageError;
use thiserror::Error;

/// Recording session errors
#[derive(Debug, Error)]
pub enum RecorderError {
    /// A session is already running or draining
    #[error("a recording is already in progress")]
    AlreadyRecording,

    /// No session to stop
    #[error("no recording in progress")]
    NotRecording,

    /// Destination folder cannot be created
    #[error("cannot create destination {path}: {source}")]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A video writer could not be opened
    #[error("cannot open video writer for port {port}: {source}")]
    WriterOpen {
        port: CameraId,
        #[source]
        source: StorageError,
    },

    /// Video finalization failed
    #[error("cannot finalize video for port {port}: {source}")]
    Finalize {
        port: CameraId,
        #[source]
        source: StorageError,
    },

    /// Provenance table could not be persisted
    #[error("cannot write provenance table {path}: {source}")]
    ProvenanceWrite {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    /// The recording worker died
    #[error("recording worker panicked: {0}")]
    WorkerPanicked(String),
}
