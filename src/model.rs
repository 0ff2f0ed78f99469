// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use std::fmt;

use url::Url;

/// 已加载的推理模型
pub trait ModelHandle: Send + Sync + 'static {
  /// 模型来源；缺失时视为加载失败
  fn model_url(&self) -> Option<&Url>;
}

pub trait ModelLoader: Sync {
  type Handle: ModelHandle;
  type Error: std::error::Error + Send + Sync + 'static;

  fn load_model(&self, locator: &ModelLocator) -> Result<Self::Handle, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
  /// 手部区域检测模型
  Detector,
  /// 手部关键点（骨架）模型
  Skeleton,
}

impl fmt::Display for ModelKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModelKind::Detector => write!(f, "detector"),
      ModelKind::Skeleton => write!(f, "skeleton"),
    }
  }
}

mod loader;
mod locator;
pub use self::loader::{LoadDiagnostic, LoadFailure, LoadReport, ModelCache, ModelSlot};
pub use self::locator::{LocatorError, ModelLocator};
