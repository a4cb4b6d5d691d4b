//! Ingestion 错误类型

use contracts::CameraId;
use session_io::StorageError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 回放会话加载失败
    #[error("failed to load playback for camera {port}: {source}")]
    PlaybackLoad {
        /// 相机端口
        port: CameraId,
        /// 底层存储错误
        #[source]
        source: StorageError,
    },

    /// 回放会话中没有该相机的帧
    #[error("playback session has no frames for camera {port}")]
    PlaybackEmpty {
        /// 相机端口
        port: CameraId,
    },

    /// 相机参数无效
    #[error("invalid camera {port}: {message}")]
    InvalidCamera {
        /// 相机端口
        port: CameraId,
        /// 错误消息
        message: String,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
