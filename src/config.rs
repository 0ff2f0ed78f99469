// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 手部姿态配置
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 顶层配置，键名与 JSON 配置文件一致（camelCase），缺省字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
  /// 仅影响诊断日志
  pub debug: bool,
  /// 模型路径前缀
  pub model_base_path: String,
  pub hand: HandConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      debug: false,
      model_base_path: "models/".to_string(),
      hand: HandConfig::default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandConfig {
  /// 是否加载检测模型并运行手部流水线
  pub enabled: bool,
  /// 是否加载关键点（骨架）模型
  pub landmarks: bool,
  /// 低于该置信度的手只保留检测框，不输出关键点
  pub min_confidence: f32,
  /// 非极大值抑制的 IoU 阈值
  pub iou_threshold: f32,
  /// 检测框的最低置信度
  pub score_threshold: f32,
  pub max_detected: usize,
  pub detector: ModelConfig,
  pub skeleton: ModelConfig,
}

impl Default for HandConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      landmarks: true,
      min_confidence: 0.1,
      iou_threshold: 0.1,
      score_threshold: 0.5,
      max_detected: 1,
      detector: ModelConfig {
        model_path: "handdetect.json".to_string(),
      },
      skeleton: ModelConfig {
        model_path: "handskeleton.json".to_string(),
      },
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
  pub model_path: String,
}

impl Config {
  pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    debug!("读取配置文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn with_model_base_path(mut self, base: impl Into<String>) -> Self {
    self.model_base_path = base.into();
    self
  }

  pub fn with_debug(mut self, debug: bool) -> Self {
    self.debug = debug;
    self
  }
}

/// 拼接模型路径：以 `.`、`/` 或 URL 方案开头的路径原样使用
pub fn join_model_path(base: &str, file: &str) -> String {
  let skip_join = file.starts_with('.')
    || file.starts_with('/')
    || file.starts_with("http:")
    || file.starts_with("https:")
    || file.starts_with("file:");
  if skip_join || base.is_empty() {
    return file.to_string();
  }

  let separator = if base.ends_with('/') { "" } else { "/" };
  format!("{}{}{}", base, separator, file)
}
