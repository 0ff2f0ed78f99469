// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 两阶段手部推理流水线接口
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

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{config::Config, frame::ImageTensor, model::ModelLoader};

/// 三维关键点 `[x, y, z]`，x/y 为像素坐标
pub type Point3 = [f32; 3];

/// 像素坐标下的检测框（左上角与右下角）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionBox {
  pub top_left: [f32; 2],
  pub bottom_right: [f32; 2],
}

/// 流水线对单只手的原始输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
  #[serde(rename = "box", default)]
  pub bbox: Option<DetectionBox>,
  pub confidence: f32,
  /// 仅运行检测阶段时为空
  #[serde(default)]
  pub landmarks: Option<Vec<Point3>>,
}

pub trait HandPipeline: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `Ok(None)` 表示本帧没有可用结果
  fn estimate_hands(
    &self,
    input: &dyn ImageTensor,
    config: &Config,
  ) -> Result<Option<Vec<RawDetection>>, Self::Error>;
}

/// 推理后端：负责加载模型并把两个模型句柄组装成流水线
pub trait HandBackend: ModelLoader {
  type Pipeline: HandPipeline;

  fn build_pipeline(
    &self,
    detector: Option<Arc<Self::Handle>>,
    skeleton: Option<Arc<Self::Handle>>,
  ) -> Self::Pipeline;
}
