//! RigBlueprint - Config Loader 输出
//!
//! 描述完整的采集配置：相机列表、同步策略、录制参数。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::{Validate, ValidationError};

use crate::CameraId;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RigBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 同步策略配置
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncConfig,

    /// 录制配置
    #[serde(default)]
    #[validate(nested)]
    pub recording: RecordingConfig,

    /// 相机列表
    #[validate(length(min = 1, message = "at least one camera is required"), nested)]
    pub cameras: Vec<CameraConfig>,
}

/// 相机配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CameraConfig {
    /// 端口号 (唯一)
    pub port: CameraId,

    /// 采集帧率 (Hz)，必须 > 0
    #[validate(range(exclusive_min = 0.0, message = "fps must be > 0"))]
    pub fps: f64,

    /// 分辨率 [width, height]
    #[validate(custom(function = "validate_resolution"))]
    pub resolution: [u32; 2],

    /// 显示时顺时针旋转的 90° 次数
    #[serde(default)]
    pub rotation_count: i32,

    /// 帧来源
    #[serde(default)]
    pub source: SourceConfig,
}

fn validate_resolution(resolution: &[u32; 2]) -> Result<(), ValidationError> {
    if resolution[0] == 0 || resolution[1] == 0 {
        let mut err = ValidationError::new("resolution");
        err.message = Some("width and height must be > 0".into());
        return Err(err);
    }
    Ok(())
}

impl CameraConfig {
    /// 运行时相机概况
    pub fn profile(&self) -> CameraProfile {
        CameraProfile {
            port: self.port,
            fps: self.fps,
            width: self.resolution[0],
            height: self.resolution[1],
            rotation_count: self.rotation_count,
        }
    }
}

/// 帧来源配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// 合成帧 (测试 / 演示)
    Mock {
        /// 每 n 个采集槽跳过一个 (模拟较慢的相机)
        #[serde(default)]
        skip_every: Option<u32>,

        /// 产生 n 帧后断开
        #[serde(default)]
        fail_after: Option<u64>,

        /// 时间戳抖动幅度 (毫秒)
        #[serde(default)]
        jitter_ms: f64,
    },
    /// 回放已录制的会话
    Playback {
        /// 会话目录
        directory: PathBuf,

        /// 回放速度倍率，0 表示尽快
        #[serde(default = "default_playback_speed")]
        speed: f64,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Mock {
            skip_every: None,
            fail_after: None,
            jitter_ms: 0.0,
        }
    }
}

fn default_playback_speed() -> f64 {
    1.0
}

/// 同步策略配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SyncConfig {
    /// 目标同步频率 (Hz)
    #[serde(default = "default_target_fps")]
    #[validate(range(exclusive_min = 0.0, message = "target_fps must be > 0"))]
    pub target_fps: f64,

    /// 对齐策略
    #[serde(default)]
    pub alignment: AlignmentPolicy,

    /// 每个相机的投递队列容量
    #[serde(default = "default_delivery_capacity")]
    #[validate(range(min = 1, message = "delivery_capacity must be >= 1"))]
    pub delivery_capacity: usize,

    /// 丢包策略
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            alignment: AlignmentPolicy::default(),
            delivery_capacity: default_delivery_capacity(),
            drop_policy: DropPolicy::default(),
        }
    }
}

fn default_target_fps() -> f64 {
    30.0
}

fn default_delivery_capacity() -> usize {
    4
}

/// 对齐策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// 取最新帧，丢弃更旧的帧
    #[default]
    LatestAvailable,
    /// 取距周期参考时间最近、且在窗口内的帧
    NearestTimestamp {
        /// 窗口宽度 (毫秒)，参考时间 ± window_ms / 2
        window_ms: f64,
    },
}

/// 丢包策略 (投递队列满时)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// 丢弃最旧的帧
    #[default]
    DropOldest,
    /// 丢弃最新的帧
    DropNewest,
}

/// 录制配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordingConfig {
    /// 会话目录的父目录
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// JPEG 质量 (1..=100)
    #[serde(default = "default_jpeg_quality")]
    #[validate(range(min = 1, max = 100, message = "jpeg_quality must be in 1..=100"))]
    pub jpeg_quality: u8,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

fn default_destination() -> PathBuf {
    PathBuf::from("recordings")
}

fn default_jpeg_quality() -> u8 {
    90
}

/// 运行时相机概况
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraProfile {
    pub port: CameraId,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub rotation_count: i32,
}

impl CameraProfile {
    /// Frame dimensions as `(width, height)`
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl RigBlueprint {
    /// 所有相机的运行时概况，按配置顺序
    pub fn profiles(&self) -> Vec<CameraProfile> {
        self.cameras.iter().map(CameraConfig::profile).collect()
    }

    /// 按端口查找相机
    pub fn camera(&self, port: CameraId) -> Option<&CameraConfig> {
        self.cameras.iter().find(|camera| camera.port == port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_camera(port: u32, fps: f64) -> CameraConfig {
        CameraConfig {
            port: CameraId::new(port),
            fps,
            resolution: [640, 480],
            rotation_count: 1,
            source: SourceConfig::default(),
        }
    }

    fn sample_blueprint() -> RigBlueprint {
        RigBlueprint {
            version: ConfigVersion::V1,
            sync: SyncConfig::default(),
            recording: RecordingConfig::default(),
            cameras: vec![sample_camera(0, 30.0), sample_camera(1, 15.0)],
        }
    }

    #[test]
    fn test_profiles_follow_config_order() {
        let bp = sample_blueprint();
        let profiles = bp.profiles();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1].port, CameraId::new(1));
        assert_eq!(profiles[1].size(), (640, 480));
        assert_eq!(profiles[0].rotation_count, 1);
    }

    #[test]
    fn test_derive_validation() {
        let mut bp = sample_blueprint();
        assert!(bp.validate().is_ok());

        bp.cameras[0].fps = 0.0;
        assert!(bp.validate().is_err());

        let mut bp = sample_blueprint();
        bp.cameras[1].resolution = [0, 480];
        assert!(bp.validate().is_err());

        let mut bp = sample_blueprint();
        bp.recording.jpeg_quality = 0;
        assert!(bp.validate().is_err());

        let mut bp = sample_blueprint();
        bp.cameras.clear();
        assert!(bp.validate().is_err());
    }

    #[test]
    fn test_alignment_policy_toml_forms() {
        #[derive(Deserialize)]
        struct Wrapper {
            alignment: AlignmentPolicy,
        }

        let latest: Wrapper = toml::from_str(r#"alignment = "latest_available""#).unwrap();
        assert_eq!(latest.alignment, AlignmentPolicy::LatestAvailable);

        let nearest: Wrapper =
            toml::from_str("alignment = { nearest_timestamp = { window_ms = 30.0 } }").unwrap();
        assert_eq!(
            nearest.alignment,
            AlignmentPolicy::NearestTimestamp { window_ms: 30.0 }
        );
    }

    #[test]
    fn test_source_config_tagged() {
        let source: SourceConfig =
            serde_json::from_str(r#"{"kind":"playback","directory":"/tmp/session"}"#).unwrap();
        assert_eq!(
            source,
            SourceConfig::Playback {
                directory: PathBuf::from("/tmp/session"),
                speed: 1.0
            }
        );

        let mock: SourceConfig = serde_json::from_str(r#"{"kind":"mock","skip_every":2}"#).unwrap();
        assert!(matches!(
            mock,
            SourceConfig::Mock {
                skip_every: Some(2),
                ..
            }
        ));
    }
}
