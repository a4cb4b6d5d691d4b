//! # Ingestion
//!
//! Camera stream module.
//!
//! Responsibilities:
//! - Wrap a `FrameSource` (mock, playback, or an externally driven `PushSource`) as a `CameraStream`
//! - Number captured frames per camera (`frame_index`)
//! - Reference-counted activation: frames are pushed only while active
//! - Bounded delivery point with drop policy
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{CameraStream, MockCamera, MockCameraConfig};
//! use contracts::StreamConfig;
//!
//! let source = MockCamera::new(MockCameraConfig::new(0, 30.0, 640, 480));
//! let stream = CameraStream::new(Box::new(source), StreamConfig::default());
//! stream.start();
//! let _guard = stream.activate();
//! let frame = stream.next_within(std::time::Duration::from_millis(100)).await;
//! ```

mod config;
mod delivery;
mod error;
mod mock;
mod pipeline;
mod playback;
mod push;
mod stream;

// Re-exports
pub use config::{DropPolicy, MetricsSnapshot, StreamConfig, StreamMetrics};
pub use delivery::{deliver, Delivery};
pub use error::{IngestionError, Result};
pub use mock::{MockCamera, MockCameraConfig};
pub use pipeline::{build_streams, open_source};
pub use playback::PlaybackSource;
pub use push::{PushHandle, PushSource};
pub use stream::{ActivationGuard, CameraStream, FramePoll};
