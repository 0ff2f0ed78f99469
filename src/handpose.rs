// 该文件是 Shanan （山南西风） 项目的一部分。
// src/handpose.rs - 手部姿态估计入口
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

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::{
  annotate::AnnotateError,
  config::Config,
  frame::ImageTensor,
  model::{LoadReport, ModelCache},
  pipeline::{HandBackend, HandPipeline},
  result::{HandResult, assemble_hands},
};

#[derive(Error, Debug)]
pub enum HandPoseError {
  #[error("模型尚未加载，请先调用 load")]
  NotLoaded,
  #[error("流水线错误: {0}")]
  Pipeline(Box<dyn std::error::Error + Send + Sync>),
  #[error("关键点分组错误: {0}")]
  Annotate(#[from] AnnotateError),
}

/// 手部姿态估计：持有后端、模型缓存与当前流水线
pub struct HandPose<B: HandBackend> {
  backend: B,
  models: ModelCache<B::Handle>,
  pipeline: RwLock<Option<Arc<B::Pipeline>>>,
}

impl<B: HandBackend> HandPose<B> {
  pub fn new(backend: B) -> Self {
    Self {
      backend,
      models: ModelCache::new(),
      pipeline: RwLock::new(None),
    }
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn models(&self) -> &ModelCache<B::Handle> {
    &self.models
  }

  /// 确保模型已加载，并用当前句柄重新构造流水线
  pub fn load(&self, config: &Config) -> LoadReport<B::Handle> {
    let report = self.models.ensure_loaded(&self.backend, config);
    let pipeline = self
      .backend
      .build_pipeline(report.detector.handle(), report.skeleton.handle());
    debug!(
      "构造手部流水线: detector={:?}, skeleton={:?}",
      report.detector, report.skeleton
    );
    *self
      .pipeline
      .write()
      .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(pipeline));
    report
  }

  /// 对一帧图像做手部估计，结果按流水线输出顺序编号
  pub fn predict<T: ImageTensor>(
    &self,
    input: &T,
    config: &Config,
  ) -> Result<Vec<HandResult>, HandPoseError> {
    if !config.hand.enabled {
      return Ok(Vec::new());
    }

    let pipeline = self
      .pipeline
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
      .ok_or(HandPoseError::NotLoaded)?;

    let detections = pipeline
      .estimate_hands(input, config)
      .map_err(|e| HandPoseError::Pipeline(Box::new(e)))?;
    let Some(detections) = detections else {
      return Ok(Vec::new());
    };

    let hands = assemble_hands(&detections, input.width(), input.height())?;
    debug!("检测到 {} 只手", hands.len());
    Ok(hands)
  }

  /// 清空模型缓存并丢弃流水线
  pub fn reset(&self) {
    self.models.reset();
    *self
      .pipeline
      .write()
      .unwrap_or_else(PoisonError::into_inner) = None;
  }
}
