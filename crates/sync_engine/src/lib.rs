//! # Sync Engine
//!
//! 多相机帧同步与分发。
//!
//! 负责：
//! - 按目标频率周期性地从各相机流取帧
//! - 按对齐策略 (最新帧 / 最近时间戳) 选帧
//! - 分配无间断的 `sync_index`，构造 `SyncBundle`
//! - 向所有订阅者扇出 (每个订阅者一个无界队列)
//! - 暂停 / 恢复 / 停止
//!
//! ## 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::Synchronizer;
//!
//! let sync = Arc::new(Synchronizer::new(streams, config)?);
//! let mut sub = sync.subscribe();
//! let handle = sync.spawn();
//!
//! while let Some(bundle) = sub.recv().await {
//!     // Handle synchronized bundle
//! }
//! ```

mod buffer;
mod error;
mod registry;
mod synchronizer;

pub use buffer::FrameBuffer;
pub use error::SyncError;
pub use registry::{SubscriberId, Subscription, SubscriptionRegistry};
pub use synchronizer::{RunState, Synchronizer};

// Re-export contracts types
pub use contracts::{AlignmentPolicy, LaneStats, SyncBundle, SynchronizerConfig};
