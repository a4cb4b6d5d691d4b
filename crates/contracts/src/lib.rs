//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Capture timestamps are wall-clock seconds since the UNIX epoch (f64)
//! - `frame_index` is per camera, `sync_index` is per synchronizer run

mod blueprint;
mod camera_id;
mod clock;
mod error;
mod frame;
mod sink;
mod source;
mod sync;
mod sync_engine_config;

pub use blueprint::*;
pub use camera_id::CameraId;
pub use clock::unix_seconds;
pub use error::*;
pub use frame::*;
pub use sink::*;
pub use source::{FrameCallback, FrameSource};
pub use sync::*;
pub use sync_engine_config::*;
