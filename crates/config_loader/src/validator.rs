//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则 (derive): fps > 0、分辨率非零、jpeg_quality 在 1..=100、至少一个相机
//! - 相机端口唯一
//! - nearest_timestamp 窗口 > 0
//! - 回放速度 >= 0

use std::collections::HashSet;

use contracts::{AlignmentPolicy, ContractError, RigBlueprint, SourceConfig};
use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 RigBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| first_violation("", &errors))?;
    validate_ports(blueprint)?;
    validate_alignment(blueprint)?;
    validate_sources(blueprint)?;
    Ok(())
}

/// 将 derive 校验结果展开为第一条带路径的错误
fn first_violation(prefix: &str, errors: &ValidationErrors) -> ContractError {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    return ContractError::config_validation(path, message);
                }
            }
            ValidationErrorsKind::Struct(inner) => return first_violation(&path, inner),
            ValidationErrorsKind::List(items) => {
                if let Some((idx, inner)) = items.iter().next() {
                    return first_violation(&format!("{path}[{idx}]"), inner);
                }
            }
        }
    }

    ContractError::config_validation(prefix, "invalid value")
}

/// 校验相机端口唯一性
fn validate_ports(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for camera in &blueprint.cameras {
        if !seen.insert(camera.port) {
            return Err(ContractError::config_validation(
                format!("cameras[port={}]", camera.port),
                "duplicate port",
            ));
        }
    }
    Ok(())
}

/// 校验对齐窗口
fn validate_alignment(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    if let AlignmentPolicy::NearestTimestamp { window_ms } = blueprint.sync.alignment {
        if !(window_ms > 0.0) {
            return Err(ContractError::config_validation(
                "sync.alignment.window_ms",
                format!("window_ms must be > 0, got {window_ms}"),
            ));
        }
    }
    Ok(())
}

/// 校验帧来源参数
fn validate_sources(blueprint: &RigBlueprint) -> Result<(), ContractError> {
    for camera in &blueprint.cameras {
        match &camera.source {
            SourceConfig::Mock {
                skip_every,
                jitter_ms,
                ..
            } => {
                if matches!(skip_every, Some(0 | 1)) {
                    return Err(ContractError::config_validation(
                        format!("cameras[port={}].source.skip_every", camera.port),
                        "skip_every must be >= 2",
                    ));
                }
                if *jitter_ms < 0.0 {
                    return Err(ContractError::config_validation(
                        format!("cameras[port={}].source.jitter_ms", camera.port),
                        "jitter_ms must be >= 0",
                    ));
                }
            }
            SourceConfig::Playback { speed, .. } => {
                if !(*speed >= 0.0) {
                    return Err(ContractError::config_validation(
                        format!("cameras[port={}].source.speed", camera.port),
                        format!("speed must be >= 0, got {speed}"),
                    ));
                }
            }
        }
    }
    Ok(())
}
