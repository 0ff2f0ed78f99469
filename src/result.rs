// 该文件是 Shanan （山南西风） 项目的一部分。
// src/result.rs - 手部结果组装
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

use serde::{Deserialize, Serialize};

use crate::{
  annotate::{AnnotateError, HandAnnotations, annotate},
  coords::normalize_box,
  pipeline::{Point3, RawDetection},
};

/// 单只手的最终结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandResult {
  /// 在本帧结果中的序号，从 0 开始
  pub id: usize,
  /// 保留两位小数
  pub confidence: f32,
  /// 像素坐标 `[x, y, w, h]`，已裁剪到图像范围
  #[serde(rename = "box")]
  pub bbox: [f32; 4],
  /// 归一化 `[x, y, w, h]`，未裁剪
  #[serde(rename = "boxRaw")]
  pub bbox_raw: [f32; 4],
  pub landmarks: Option<Vec<Point3>>,
  /// 当且仅当有关键点时存在，缺失时序列化为 `{}`
  #[serde(with = "empty_when_absent", default)]
  pub annotations: Option<HandAnnotations>,
}

mod empty_when_absent {
  use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeMap};

  use crate::annotate::HandAnnotations;

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Annotations {
    Grouped(HandAnnotations),
    Empty {},
  }

  pub fn serialize<S: Serializer>(
    annotations: &Option<HandAnnotations>,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    match annotations {
      Some(annotations) => annotations.serialize(serializer),
      None => serializer.serialize_map(Some(0))?.end(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Option<HandAnnotations>, D::Error> {
    Ok(match Option::<Annotations>::deserialize(deserializer)? {
      Some(Annotations::Grouped(annotations)) => Some(annotations),
      Some(Annotations::Empty {}) | None => None,
    })
  }
}

impl HandResult {
  pub fn from_detection(
    id: usize,
    detection: &RawDetection,
    image_width: f32,
    image_height: f32,
  ) -> Result<Self, AnnotateError> {
    let (bbox, bbox_raw) = normalize_box(detection.bbox.as_ref(), image_width, image_height);
    let annotations = detection
      .landmarks
      .as_deref()
      .map(annotate)
      .transpose()?;

    Ok(HandResult {
      id,
      confidence: round_confidence(detection.confidence),
      bbox,
      bbox_raw,
      landmarks: detection.landmarks.clone(),
      annotations,
    })
  }
}

pub fn round_confidence(confidence: f32) -> f32 {
  (confidence * 100.0).round() / 100.0
}

/// 按输入顺序把一帧的原始检测转换为结果列表
pub fn assemble_hands(
  detections: &[RawDetection],
  image_width: usize,
  image_height: usize,
) -> Result<Vec<HandResult>, AnnotateError> {
  detections
    .iter()
    .enumerate()
    .map(|(id, detection)| {
      HandResult::from_detection(id, detection, image_width as f32, image_height as f32)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{annotate::FingerGroup, pipeline::DetectionBox};

  fn detection(confidence: f32, landmarks: Option<usize>) -> RawDetection {
    RawDetection {
      bbox: Some(DetectionBox {
        top_left: [10.0, 20.0],
        bottom_right: [110.0, 220.0],
      }),
      confidence,
      landmarks: landmarks.map(|n| (0..n).map(|i| [i as f32, 0.0, 0.0]).collect()),
    }
  }

  #[test]
  fn confidence_is_rounded_to_two_places() {
    assert_eq!(round_confidence(0.8567), 0.86);
    assert_eq!(round_confidence(1.0), 1.0);
    assert_eq!(round_confidence(0.0), 0.0);
    assert_eq!(round_confidence(0.123), 0.12);
  }

  #[test]
  fn ids_follow_input_order() {
    let detections = vec![detection(0.9, None), detection(0.5, None), detection(0.7, None)];
    let hands = assemble_hands(&detections, 300, 400).unwrap();
    let ids: Vec<usize> = hands.iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    let confidences: Vec<f32> = hands.iter().map(|h| h.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.5, 0.7]);
  }

  #[test]
  fn boxes_use_image_dimensions() {
    let hands = assemble_hands(&[detection(0.9, None)], 300, 400).unwrap();
    assert_eq!(hands[0].bbox, [10.0, 20.0, 100.0, 200.0]);
    assert_eq!(
      hands[0].bbox_raw,
      [10.0 / 300.0, 20.0 / 400.0, 100.0 / 300.0, 200.0 / 400.0]
    );
  }

  #[test]
  fn annotations_only_with_landmarks() {
    let hands = assemble_hands(&[detection(0.9, None), detection(0.9, Some(21))], 300, 400).unwrap();
    assert!(hands[0].landmarks.is_none());
    assert!(hands[0].annotations.is_none());

    let annotations = hands[1].annotations.as_ref().unwrap();
    assert_eq!(annotations.get(FingerGroup::RingFinger)[0], [13.0, 0.0, 0.0]);
    assert_eq!(hands[1].landmarks.as_ref().map(Vec::len), Some(21));
  }

  #[test]
  fn missing_box_defaults_to_zero() {
    let mut raw = detection(0.4, None);
    raw.bbox = None;
    let hands = assemble_hands(&[raw], 640, 480).unwrap();
    assert_eq!(hands[0].bbox, [0.0; 4]);
    assert_eq!(hands[0].bbox_raw, [0.0; 4]);
  }

  #[test]
  fn short_landmarks_fail_the_frame() {
    let err = assemble_hands(&[detection(0.9, Some(21)), detection(0.9, Some(5))], 300, 400)
      .unwrap_err();
    assert!(matches!(err, AnnotateError::TooFewLandmarks { actual: 5, .. }));
  }

  #[test]
  fn empty_input_gives_empty_output() {
    assert!(assemble_hands(&[], 300, 400).unwrap().is_empty());
  }

  #[test]
  fn serializes_box_keys() {
    let hands = assemble_hands(&[detection(0.9, None)], 300, 400).unwrap();
    let value = serde_json::to_value(&hands[0]).unwrap();
    assert!(value.get("box").is_some());
    assert!(value.get("boxRaw").is_some());
    assert_eq!(value["id"], 0);
  }

  #[test]
  fn missing_annotations_serialize_as_empty_object() {
    let hands = assemble_hands(&[detection(0.9, None), detection(0.9, Some(21))], 300, 400).unwrap();

    let value = serde_json::to_value(&hands[0]).unwrap();
    assert_eq!(value["annotations"], serde_json::json!({}));
    let parsed: HandResult = serde_json::from_value(value).unwrap();
    assert!(parsed.annotations.is_none());

    let value = serde_json::to_value(&hands[1]).unwrap();
    assert!(value["annotations"]["palmBase"].is_array());
    let parsed: HandResult = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.annotations, hands[1].annotations);
  }
}
