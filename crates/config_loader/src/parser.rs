//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, RigBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<RigBlueprint, ContractError> {
    toml::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("TOML parse error: {e}"), e))
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<RigBlueprint, ContractError> {
    serde_json::from_str(content)
        .map_err(|e| ContractError::config_parse_with(format!("JSON parse error: {e}"), e))
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<RigBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlignmentPolicy, CameraId, DropPolicy, SourceConfig};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[[cameras]]
port = 0
fps = 30.0
resolution = [640, 480]
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.cameras.len(), 1);
        assert_eq!(bp.cameras[0].port, CameraId::new(0));
        assert_eq!(bp.cameras[0].source, SourceConfig::default());
        assert_eq!(bp.sync.delivery_capacity, 4);
        assert_eq!(bp.sync.drop_policy, DropPolicy::DropOldest);
        assert_eq!(bp.recording.jpeg_quality, 90);
    }

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[sync]
target_fps = 15.0
alignment = { nearest_timestamp = { window_ms = 30.0 } }
delivery_capacity = 8
drop_policy = "drop_newest"

[recording]
destination = "/data/sessions"
jpeg_quality = 75

[[cameras]]
port = 0
fps = 30.0
resolution = [1280, 720]
rotation_count = 2

[[cameras]]
port = 3
fps = 15.0
resolution = [640, 480]
[cameras.source]
kind = "playback"
directory = "/data/sessions/previous"
speed = 0.0
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.sync.target_fps, 15.0);
        assert_eq!(
            bp.sync.alignment,
            AlignmentPolicy::NearestTimestamp { window_ms: 30.0 }
        );
        assert_eq!(bp.sync.drop_policy, DropPolicy::DropNewest);
        assert_eq!(bp.recording.jpeg_quality, 75);
        assert_eq!(bp.cameras[0].rotation_count, 2);
        assert!(matches!(
            bp.cameras[1].source,
            SourceConfig::Playback { speed, .. } if speed == 0.0
        ));
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "sync": { "target_fps": 10.0 },
            "cameras": [
                { "port": 1, "fps": 20.0, "resolution": [320, 240] },
                { "port": 2, "fps": 20.0, "resolution": [320, 240],
                  "source": { "kind": "mock", "skip_every": 2 } }
            ]
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert_eq!(result.unwrap().cameras.len(), 2);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
