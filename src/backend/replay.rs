// 该文件是 Shanan （山南西风） 项目的一部分。
// src/backend/replay.rs - 回放录制检测结果的离线后端
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
  convert::Infallible,
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  config::Config,
  frame::ImageTensor,
  model::{LocatorError, ModelHandle, ModelLoader, ModelLocator},
  pipeline::{DetectionBox, HandBackend, HandPipeline, RawDetection},
};

const FILE_SCHEME: &str = "file";

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("不支持远程模型: {0}")]
  RemoteUnsupported(String),
  #[error("模型定位错误: {0}")]
  LocatorError(#[from] LocatorError),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("录制文件解析错误: {0}")]
  RecordingError(#[from] serde_json::Error),
}

/// 从本地文件读入的模型
#[derive(Debug)]
pub struct ModelFile {
  url: Url,
  data: Box<[u8]>,
}

impl ModelFile {
  pub fn bytes(&self) -> &[u8] {
    &self.data
  }
}

impl ModelHandle for ModelFile {
  fn model_url(&self) -> Option<&Url> {
    Some(&self.url)
  }
}

/// 逐帧录制的原始检测结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recording {
  frames: Vec<Vec<RawDetection>>,
}

impl From<Vec<Vec<RawDetection>>> for Recording {
  fn from(frames: Vec<Vec<RawDetection>>) -> Self {
    Self { frames }
  }
}

impl Recording {
  pub fn from_json_str(text: &str) -> Result<Self, ReplayError> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
    let path = path.as_ref();
    info!("读取录制文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json_str(&text)
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn frame(&self, index: usize) -> Option<&[RawDetection]> {
    self.frames.get(index).map(Vec::as_slice)
  }
}

pub struct ReplayBackend {
  recording: Arc<Recording>,
  cursor: Arc<AtomicUsize>,
}

impl ReplayBackend {
  pub fn new(recording: Recording) -> Self {
    Self {
      recording: Arc::new(recording),
      cursor: Arc::new(AtomicUsize::new(0)),
    }
  }

  /// 回到录制的第一帧
  pub fn rewind(&self) {
    self.cursor.store(0, Ordering::SeqCst);
  }
}

impl ModelLoader for ReplayBackend {
  type Handle = ModelFile;
  type Error = ReplayError;

  fn load_model(&self, locator: &ModelLocator) -> Result<ModelFile, ReplayError> {
    if locator.from_remote_hub {
      return Err(ReplayError::RemoteUnsupported(locator.path.clone()));
    }

    let url = locator.url()?;
    if url.scheme() != FILE_SCHEME {
      return Err(ReplayError::RemoteUnsupported(url.to_string()));
    }
    let path = url
      .to_file_path()
      .map_err(|_| LocatorError::InvalidPath(locator.path.clone()))?;

    debug!("加载模型文件: {}", path.display());
    let data = std::fs::read(&path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      data.len() as f64 / (1024.0 * 1024.0)
    );

    Ok(ModelFile {
      url,
      data: data.into_boxed_slice(),
    })
  }
}

impl HandBackend for ReplayBackend {
  type Pipeline = ReplayPipeline;

  fn build_pipeline(
    &self,
    detector: Option<Arc<ModelFile>>,
    skeleton: Option<Arc<ModelFile>>,
  ) -> ReplayPipeline {
    ReplayPipeline {
      detector,
      skeleton,
      recording: Arc::clone(&self.recording),
      cursor: Arc::clone(&self.cursor),
    }
  }
}

/// 按顺序回放录制帧；每次调用前进一帧，越过末尾后不再有结果
pub struct ReplayPipeline {
  detector: Option<Arc<ModelFile>>,
  skeleton: Option<Arc<ModelFile>>,
  recording: Arc<Recording>,
  cursor: Arc<AtomicUsize>,
}

impl HandPipeline for ReplayPipeline {
  type Error = Infallible;

  fn estimate_hands(
    &self,
    input: &dyn ImageTensor,
    config: &Config,
  ) -> Result<Option<Vec<RawDetection>>, Self::Error> {
    if self.detector.is_none() {
      debug!("检测模型不可用，跳过本帧");
      return Ok(None);
    }

    let index = self.cursor.fetch_add(1, Ordering::SeqCst);
    let Some(frame) = self.recording.frame(index) else {
      debug!("录制已回放完毕 (第 {} 帧)", index);
      return Ok(None);
    };
    debug!(
      "回放第 {} 帧, 输入尺寸 {:?}, 原始检测 {} 个",
      index,
      input.shape(),
      frame.len()
    );

    let scored = frame
      .iter()
      .filter(|detection| detection.confidence >= config.hand.score_threshold)
      .cloned()
      .collect();

    let keep_landmarks = config.hand.landmarks && self.skeleton.is_some();
    let hands = suppress_overlaps(scored, config.hand.iou_threshold)
      .into_iter()
      .take(config.hand.max_detected)
      .map(|mut detection| {
        // 关键点置信度不足时只保留检测框
        if !keep_landmarks || detection.confidence < config.hand.min_confidence {
          detection.landmarks = None;
        }
        detection
      })
      .collect();

    Ok(Some(hands))
  }
}

/// 非极大值抑制，没有检测框的结果不参与抑制
fn suppress_overlaps(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
  // 按置信度降序排序
  detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut result: Vec<RawDetection> = Vec::with_capacity(detections.len());
  for detection in detections {
    let overlapped = detection.bbox.is_some_and(|bbox| {
      result
        .iter()
        .filter_map(|kept| kept.bbox)
        .any(|kept| iou(&kept, &bbox) >= iou_threshold)
    });
    if !overlapped {
      result.push(detection);
    }
  }

  result
}

fn iou(a: &DetectionBox, b: &DetectionBox) -> f32 {
  let x1 = a.top_left[0].max(b.top_left[0]);
  let y1 = a.top_left[1].max(b.top_left[1]);
  let x2 = a.bottom_right[0].min(b.bottom_right[0]);
  let y2 = a.bottom_right[1].min(b.bottom_right[1]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area = |r: &DetectionBox| {
    (r.bottom_right[0] - r.top_left[0]).max(0.0) * (r.bottom_right[1] - r.top_left[1]).max(0.0)
  };
  let union = area(a) + area(b) - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::RgbNhwcFrame, model::ModelKind};
  use std::io::Write;
  use tempfile::NamedTempFile;

  fn detection(confidence: f32) -> RawDetection {
    RawDetection {
      bbox: None,
      confidence,
      landmarks: Some(vec![[0.0; 3]; 21]),
    }
  }

  fn model_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[1, 2, 3, 4]).unwrap();
    file
  }

  fn pipeline(recording: Recording, with_skeleton: bool) -> ReplayPipeline {
    let backend = ReplayBackend::new(recording);
    let file = model_file();
    let locator = ModelLocator::new("", file.path().to_str().unwrap());
    let handle = Arc::new(backend.load_model(&locator).unwrap());
    let skeleton = with_skeleton.then(|| Arc::clone(&handle));
    backend.build_pipeline(Some(handle), skeleton)
  }

  #[test]
  fn loads_local_model_file() {
    let file = model_file();
    let backend = ReplayBackend::new(Recording::default());
    let locator = ModelLocator::new("", file.path().to_str().unwrap());
    let model = backend.load_model(&locator).unwrap();
    assert_eq!(model.bytes(), &[1, 2, 3, 4]);
    assert_eq!(model.model_url().unwrap().scheme(), "file");
  }

  #[test]
  fn missing_model_file_fails() {
    let backend = ReplayBackend::new(Recording::default());
    let locator = ModelLocator::new("/nonexistent", "handdetect.json");
    let err = backend.load_model(&locator).unwrap_err();
    assert!(matches!(err, ReplayError::ModelLoadError(_)));
  }

  #[test]
  fn remote_hub_is_unsupported() {
    let backend = ReplayBackend::new(Recording::default());
    let mut config = Config::default();
    config.hand.detector.model_path = "https://tfhub.dev/mediapipe/handdetector/1".to_string();
    let locator = ModelLocator::resolve(&config, ModelKind::Detector);
    let err = backend.load_model(&locator).unwrap_err();
    assert!(matches!(err, ReplayError::RemoteUnsupported(_)));
  }

  #[test]
  fn replays_frames_in_order_then_stops() {
    let recording = Recording::from(vec![vec![detection(0.9)], vec![], vec![detection(0.8)]]);
    let pipeline = pipeline(recording, true);
    let frame = RgbNhwcFrame::with_shape(4, 4);
    let config = Config::default();

    let first = pipeline.estimate_hands(&frame, &config).unwrap().unwrap();
    assert_eq!(first[0].confidence, 0.9);
    assert!(pipeline.estimate_hands(&frame, &config).unwrap().unwrap().is_empty());
    let third = pipeline.estimate_hands(&frame, &config).unwrap().unwrap();
    assert_eq!(third[0].confidence, 0.8);
    assert!(pipeline.estimate_hands(&frame, &config).unwrap().is_none());
  }

  #[test]
  fn applies_score_threshold_and_count_limit() {
    let recording = Recording::from(vec![vec![
      detection(0.05),
      detection(0.6),
      detection(0.7),
      detection(0.5),
    ]]);
    let pipeline = pipeline(recording, true);
    let mut config = Config::default();
    config.hand.max_detected = 2;

    let hands = pipeline
      .estimate_hands(&RgbNhwcFrame::with_shape(4, 4), &config)
      .unwrap()
      .unwrap();
    let confidences: Vec<f32> = hands.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.7, 0.6]);
  }

  #[test]
  fn overlapping_boxes_are_suppressed() {
    let boxed = |confidence, x: f32| RawDetection {
      bbox: Some(DetectionBox {
        top_left: [x, 0.0],
        bottom_right: [x + 10.0, 10.0],
      }),
      ..detection(confidence)
    };
    let recording = Recording::from(vec![vec![boxed(0.8, 0.0), boxed(0.9, 1.0), boxed(0.7, 50.0)]]);
    let pipeline = pipeline(recording, true);
    let mut config = Config::default();
    config.hand.max_detected = 10;

    let hands = pipeline
      .estimate_hands(&RgbNhwcFrame::with_shape(64, 64), &config)
      .unwrap()
      .unwrap();
    let confidences: Vec<f32> = hands.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.7]);
  }

  #[test]
  fn low_confidence_hands_lose_landmarks() {
    let pipeline = pipeline(Recording::from(vec![vec![detection(0.9), detection(0.6)]]), true);
    let mut config = Config::default();
    config.hand.max_detected = 2;
    config.hand.min_confidence = 0.8;

    let hands = pipeline
      .estimate_hands(&RgbNhwcFrame::with_shape(4, 4), &config)
      .unwrap()
      .unwrap();
    assert_eq!(hands.len(), 2);
    assert!(hands[0].landmarks.is_some());
    assert!(hands[1].landmarks.is_none());
  }

  #[test]
  fn rewind_restarts_playback() {
    let file = model_file();
    let backend = ReplayBackend::new(Recording::from(vec![vec![detection(0.9)]]));
    let locator = ModelLocator::new("", file.path().to_str().unwrap());
    let handle = Arc::new(backend.load_model(&locator).unwrap());
    let pipeline = backend.build_pipeline(Some(handle), None);
    let frame = RgbNhwcFrame::with_shape(4, 4);
    let config = Config::default();

    assert_eq!(pipeline.estimate_hands(&frame, &config).unwrap().map(|h| h.len()), Some(1));
    assert!(pipeline.estimate_hands(&frame, &config).unwrap().is_none());

    backend.rewind();
    assert_eq!(pipeline.estimate_hands(&frame, &config).unwrap().map(|h| h.len()), Some(1));
  }

  #[test]
  fn strips_landmarks_without_skeleton() {
    let pipeline = pipeline(Recording::from(vec![vec![detection(0.9)]]), false);
    let hands = pipeline
      .estimate_hands(&RgbNhwcFrame::with_shape(4, 4), &Config::default())
      .unwrap()
      .unwrap();
    assert!(hands[0].landmarks.is_none());
  }

  #[test]
  fn no_detector_means_no_result() {
    let backend = ReplayBackend::new(Recording::from(vec![vec![detection(0.9)]]));
    let pipeline = backend.build_pipeline(None, None);
    let result = pipeline
      .estimate_hands(&RgbNhwcFrame::with_shape(4, 4), &Config::default())
      .unwrap();
    assert!(result.is_none());
  }

  #[test]
  fn recording_parses_json_frames() {
    let recording = Recording::from_json_str(
      r#"[
        [{ "box": { "topLeft": [1, 2], "bottomRight": [3, 4] }, "confidence": 0.75 }],
        []
      ]"#,
    )
    .unwrap();
    assert_eq!(recording.len(), 2);
    let first = &recording.frame(0).unwrap()[0];
    assert_eq!(first.bbox.unwrap().bottom_right, [3.0, 4.0]);
    assert!(first.landmarks.is_none());
  }
}
