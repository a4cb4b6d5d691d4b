//! # Session IO
//!
//! On-disk formats of a recording session.
//!
//! A session directory holds one MJPEG-in-AVI file per camera
//! (`port_<id>.avi`) plus `frame_time_history.csv`, which maps every written
//! frame back to the synchronized bundle it came from.

pub mod avi;
mod convert;
mod error;
mod provenance;
mod session;

pub use avi::{AviInfo, AviParams, AviReader, AviWriter};
pub use convert::{to_rgb_image, to_rgb_pixels};
pub use error::StorageError;
pub use provenance::{read_provenance, write_provenance, ProvenanceRow, PROVENANCE_COLUMNS};
pub use session::{
    provenance_path, video_path, PortSummary, SessionSummary, PROVENANCE_FILE, VIDEO_EXTENSION,
};
