//! # Dispatcher
//!
//! 同步数据的消费端。
//!
//! 负责：
//! - 每个 sink 独立订阅、独立任务，慢 sink 只拖慢自己的队列
//! - 录制：每相机一个 MJPEG AVI + `frame_time_history.csv`
//! - 显示：转换为 RGB、旋转、缩放后通过有界通道发给 UI

pub mod error;
pub mod handle;
pub mod metrics;
pub mod recorder;
pub mod sinks;

pub use contracts::{BundleSink, SyncBundle};
pub use error::RecorderError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use recorder::{session_folder, RecordedVideo, Recorder, RecorderState, RecordingSummary};
pub use sinks::{DisplayFrame, DisplayOptions, DisplaySelection, DisplaySink, LogSink};
