// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/loader.rs - 模型加载与缓存
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

use std::{
  fmt,
  sync::{Arc, Mutex, PoisonError},
  thread::{self, ScopedJoinHandle},
  time::Instant,
};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  config::Config,
  model::{ModelHandle, ModelKind, ModelLoader, ModelLocator},
};

#[derive(Error, Debug)]
pub enum LoadFailure {
  #[error("后端错误: {0}")]
  Backend(Box<dyn std::error::Error + Send + Sync>),
  #[error("模型缺少资源定位")]
  MissingUrl,
  #[error("加载线程异常退出")]
  Panicked,
}

/// 单个模型在一次 `ensure_loaded` 之后的状态
pub enum ModelSlot<H> {
  /// 配置未要求加载
  Skipped,
  /// 要求加载但没有可用句柄
  Failed,
  Loaded(Arc<H>),
}

impl<H> ModelSlot<H> {
  pub fn handle(&self) -> Option<Arc<H>> {
    match self {
      ModelSlot::Loaded(handle) => Some(Arc::clone(handle)),
      ModelSlot::Skipped | ModelSlot::Failed => None,
    }
  }

  pub fn is_loaded(&self) -> bool {
    matches!(self, ModelSlot::Loaded(_))
  }

  pub fn is_skipped(&self) -> bool {
    matches!(self, ModelSlot::Skipped)
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, ModelSlot::Failed)
  }
}

impl<H> Clone for ModelSlot<H> {
  fn clone(&self) -> Self {
    match self {
      ModelSlot::Skipped => ModelSlot::Skipped,
      ModelSlot::Failed => ModelSlot::Failed,
      ModelSlot::Loaded(handle) => ModelSlot::Loaded(Arc::clone(handle)),
    }
  }
}

impl<H> fmt::Debug for ModelSlot<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ModelSlot::Skipped => write!(f, "Skipped"),
      ModelSlot::Failed => write!(f, "Failed"),
      ModelSlot::Loaded(_) => write!(f, "Loaded"),
    }
  }
}

/// 加载过程中输出的诊断信息，同时写入日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadDiagnostic {
  Failed {
    kind: ModelKind,
    path: String,
    reason: String,
  },
  Loaded {
    kind: ModelKind,
    url: String,
  },
  Cached {
    kind: ModelKind,
    url: String,
  },
}

impl LoadDiagnostic {
  pub fn kind(&self) -> ModelKind {
    match self {
      LoadDiagnostic::Failed { kind, .. }
      | LoadDiagnostic::Loaded { kind, .. }
      | LoadDiagnostic::Cached { kind, .. } => *kind,
    }
  }
}

#[derive(Debug)]
pub struct LoadReport<H> {
  pub detector: ModelSlot<H>,
  pub skeleton: ModelSlot<H>,
  pub diagnostics: Vec<LoadDiagnostic>,
}

struct CachedModels<H> {
  detector: Option<Arc<H>>,
  skeleton: Option<Arc<H>>,
}

/// 进程生命周期内的模型句柄缓存
///
/// 检查与加载在同一把锁内完成，并发的首次调用只会触发一次加载。
pub struct ModelCache<H> {
  state: Mutex<CachedModels<H>>,
}

impl<H> Default for ModelCache<H> {
  fn default() -> Self {
    Self::new()
  }
}

impl<H> ModelCache<H> {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(CachedModels {
        detector: None,
        skeleton: None,
      }),
    }
  }

  /// 丢弃缓存的句柄，下一次 `ensure_loaded` 会重新加载
  pub fn reset(&self) {
    let mut cached = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    cached.detector = None;
    cached.skeleton = None;
    debug!("模型缓存已清空");
  }

  pub fn is_cached(&self, kind: ModelKind) -> bool {
    let cached = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    match kind {
      ModelKind::Detector => cached.detector.is_some(),
      ModelKind::Skeleton => cached.skeleton.is_some(),
    }
  }
}

impl<H: ModelHandle> ModelCache<H> {
  /// 确保配置要求的模型已加载
  ///
  /// 需要加载的模型并发加载并全部等待完成；失败只记录诊断，
  /// 句柄保持为空，下一次调用时自然重试。
  pub fn ensure_loaded<L>(&self, loader: &L, config: &Config) -> LoadReport<H>
  where
    L: ModelLoader<Handle = H>,
  {
    let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    let cached = &mut *guard;

    let want_detector = config.hand.enabled;
    let want_skeleton = config.hand.landmarks;
    let load_detector = want_detector && cached.detector.is_none();
    let load_skeleton = want_skeleton && cached.skeleton.is_none();

    let (detector_outcome, skeleton_outcome) = if load_detector || load_skeleton {
      let now = Instant::now();
      let outcomes = thread::scope(|s| {
        let detector =
          load_detector.then(|| s.spawn(|| load_one(loader, config, ModelKind::Detector)));
        let skeleton =
          load_skeleton.then(|| s.spawn(|| load_one(loader, config, ModelKind::Skeleton)));
        (detector.map(join_load), skeleton.map(join_load))
      });
      debug!("模型加载完成，耗时: {:.2?}", now.elapsed());
      outcomes
    } else {
      (None, None)
    };

    let mut diagnostics = Vec::new();
    for (kind, wanted, outcome, slot) in [
      (
        ModelKind::Detector,
        want_detector,
        detector_outcome,
        &mut cached.detector,
      ),
      (
        ModelKind::Skeleton,
        want_skeleton,
        skeleton_outcome,
        &mut cached.skeleton,
      ),
    ] {
      if !wanted {
        continue;
      }

      match outcome {
        Some(Ok(handle)) => {
          if config.debug {
            let url = describe(&*handle);
            info!("加载模型: {}", url);
            diagnostics.push(LoadDiagnostic::Loaded { kind, url });
          }
          *slot = Some(handle);
        }
        Some(Err(e)) => {
          let path = configured_path(config, kind).to_string();
          error!("加载模型失败: {}, 错误: {}", path, e);
          diagnostics.push(LoadDiagnostic::Failed {
            kind,
            path,
            reason: e.to_string(),
          });
        }
        None => {
          if config.debug
            && let Some(handle) = slot.as_ref()
          {
            let url = describe(&**handle);
            info!("使用缓存模型: {}", url);
            diagnostics.push(LoadDiagnostic::Cached { kind, url });
          }
        }
      }
    }

    LoadReport {
      detector: slot_of(want_detector, &cached.detector),
      skeleton: slot_of(want_skeleton, &cached.skeleton),
      diagnostics,
    }
  }
}

fn load_one<L: ModelLoader>(
  loader: &L,
  config: &Config,
  kind: ModelKind,
) -> Result<Arc<L::Handle>, LoadFailure> {
  let locator = ModelLocator::resolve(config, kind);
  debug!(
    "请求加载 {} 模型: {} (远程仓库: {})",
    kind, locator.path, locator.from_remote_hub
  );

  let handle = loader
    .load_model(&locator)
    .map_err(|e| LoadFailure::Backend(Box::new(e)))?;
  if handle.model_url().is_none() {
    return Err(LoadFailure::MissingUrl);
  }

  Ok(Arc::new(handle))
}

fn join_load<T>(handle: ScopedJoinHandle<'_, Result<T, LoadFailure>>) -> Result<T, LoadFailure> {
  handle.join().unwrap_or(Err(LoadFailure::Panicked))
}

fn configured_path(config: &Config, kind: ModelKind) -> &str {
  match kind {
    ModelKind::Detector => &config.hand.detector.model_path,
    ModelKind::Skeleton => &config.hand.skeleton.model_path,
  }
}

fn describe<H: ModelHandle>(handle: &H) -> String {
  handle
    .model_url()
    .map(|url| url.to_string())
    .unwrap_or_default()
}

fn slot_of<H>(wanted: bool, cached: &Option<Arc<H>>) -> ModelSlot<H> {
  match (wanted, cached) {
    (false, _) => ModelSlot::Skipped,
    (true, Some(handle)) => ModelSlot::Loaded(Arc::clone(handle)),
    (true, None) => ModelSlot::Failed,
  }
}
