// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/locator.rs - 模型资源定位
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

use thiserror::Error;
use url::Url;

use crate::{
  config::{Config, join_model_path},
  model::ModelKind,
};

const REMOTE_HUB_HOST: &str = "tfhub.dev";

#[derive(Error, Debug)]
pub enum LocatorError {
  #[error("URL 解析错误: {0}")]
  UrlError(#[from] url::ParseError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法把路径转换为 URL: {0}")]
  InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLocator {
  /// 配置中的原始模型路径，用于诊断
  pub configured: String,
  /// 拼接 `modelBasePath` 之后的路径
  pub path: String,
  pub from_remote_hub: bool,
}

impl ModelLocator {
  pub fn new(base: &str, model_path: &str) -> Self {
    Self {
      configured: model_path.to_string(),
      path: join_model_path(base, model_path),
      from_remote_hub: model_path.contains(REMOTE_HUB_HOST),
    }
  }

  pub fn resolve(config: &Config, kind: ModelKind) -> Self {
    let model = match kind {
      ModelKind::Detector => &config.hand.detector,
      ModelKind::Skeleton => &config.hand.skeleton,
    };
    Self::new(&config.model_base_path, &model.model_path)
  }

  /// 绝对 URL 原样使用，文件路径相对当前工作目录解析为 `file://`
  pub fn url(&self) -> Result<Url, LocatorError> {
    match Url::parse(&self.path) {
      // 单字母方案是 Windows 盘符
      Ok(url) if url.scheme().len() > 1 => return Ok(url),
      Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => {}
      Err(e) => return Err(e.into()),
    }

    let path = Path::new(&self.path);
    let absolute = if path.is_absolute() {
      path.to_path_buf()
    } else {
      std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&absolute).map_err(|_| LocatorError::InvalidPath(self.path.clone()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolves_against_base_path() {
    let config = Config::default().with_model_base_path("/opt/models");
    let locator = ModelLocator::resolve(&config, ModelKind::Skeleton);
    assert_eq!(locator.configured, "handskeleton.json");
    assert_eq!(locator.path, "/opt/models/handskeleton.json");
    assert!(!locator.from_remote_hub);
    assert_eq!(
      locator.url().unwrap().as_str(),
      "file:///opt/models/handskeleton.json"
    );
  }

  #[test]
  fn remote_hub_paths_are_flagged() {
    let locator = ModelLocator::new("models/", "https://tfhub.dev/mediapipe/handdetector/1");
    assert!(locator.from_remote_hub);
    assert_eq!(locator.path, "https://tfhub.dev/mediapipe/handdetector/1");
    assert_eq!(locator.url().unwrap().scheme(), "https");
  }

  #[test]
  fn relative_paths_become_absolute_file_urls() {
    let locator = ModelLocator::new("models", "handdetect.json");
    let url = locator.url().unwrap();
    assert_eq!(url.scheme(), "file");
    assert!(url.path().ends_with("/models/handdetect.json"));
  }
}
