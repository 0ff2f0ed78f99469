// 该文件是 Shanan （山南西风） 项目的一部分。
// src/annotate.rs - 手部关键点分组
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
use thiserror::Error;

use crate::pipeline::Point3;

/// 手部关键点数量
pub const HAND_LANDMARK_COUNT: usize = 21;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AnnotateError {
  #[error("关键点数量不足: 需要 {expected} 个, 实际 {actual} 个")]
  TooFewLandmarks { expected: usize, actual: usize },
}

/// 解剖学分组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerGroup {
  PalmBase,
  Thumb,
  IndexFinger,
  MiddleFinger,
  RingFinger,
  Pinky,
}

impl FingerGroup {
  pub const ALL: [FingerGroup; 6] = [
    FingerGroup::PalmBase,
    FingerGroup::Thumb,
    FingerGroup::IndexFinger,
    FingerGroup::MiddleFinger,
    FingerGroup::RingFinger,
    FingerGroup::Pinky,
  ];

  /// 该分组在 21 点序列中的下标，按列出顺序
  pub fn indices(self) -> &'static [usize] {
    match self {
      FingerGroup::PalmBase => &[0],
      FingerGroup::Thumb => &[1, 2, 3, 4],
      FingerGroup::IndexFinger => &[5, 6, 7, 8],
      FingerGroup::MiddleFinger => &[9, 10, 11, 12],
      FingerGroup::RingFinger => &[13, 14, 15, 16],
      FingerGroup::Pinky => &[17, 18, 19, 20],
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      FingerGroup::PalmBase => "palmBase",
      FingerGroup::Thumb => "thumb",
      FingerGroup::IndexFinger => "indexFinger",
      FingerGroup::MiddleFinger => "middleFinger",
      FingerGroup::RingFinger => "ringFinger",
      FingerGroup::Pinky => "pinky",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandAnnotations {
  pub palm_base: [Point3; 1],
  pub thumb: [Point3; 4],
  pub index_finger: [Point3; 4],
  pub middle_finger: [Point3; 4],
  pub ring_finger: [Point3; 4],
  pub pinky: [Point3; 4],
}

impl HandAnnotations {
  pub fn get(&self, group: FingerGroup) -> &[Point3] {
    match group {
      FingerGroup::PalmBase => &self.palm_base,
      FingerGroup::Thumb => &self.thumb,
      FingerGroup::IndexFinger => &self.index_finger,
      FingerGroup::MiddleFinger => &self.middle_finger,
      FingerGroup::RingFinger => &self.ring_finger,
      FingerGroup::Pinky => &self.pinky,
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (FingerGroup, &[Point3])> + '_ {
    FingerGroup::ALL.into_iter().map(|group| (group, self.get(group)))
  }
}

fn pick<const N: usize>(landmarks: &[Point3], group: FingerGroup) -> [Point3; N] {
  let indices = group.indices();
  std::array::from_fn(|i| landmarks[indices[i]])
}

/// 把 21 个关键点按手指分组
///
/// 少于 21 个点时返回错误；多出的点被忽略。
pub fn annotate(landmarks: &[Point3]) -> Result<HandAnnotations, AnnotateError> {
  if landmarks.len() < HAND_LANDMARK_COUNT {
    return Err(AnnotateError::TooFewLandmarks {
      expected: HAND_LANDMARK_COUNT,
      actual: landmarks.len(),
    });
  }

  Ok(HandAnnotations {
    palm_base: pick(landmarks, FingerGroup::PalmBase),
    thumb: pick(landmarks, FingerGroup::Thumb),
    index_finger: pick(landmarks, FingerGroup::IndexFinger),
    middle_finger: pick(landmarks, FingerGroup::MiddleFinger),
    ring_finger: pick(landmarks, FingerGroup::RingFinger),
    pinky: pick(landmarks, FingerGroup::Pinky),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;

  fn landmarks(n: usize) -> Vec<Point3> {
    (0..n).map(|i| [i as f32, i as f32 * 2.0, -(i as f32)]).collect()
  }

  #[test]
  fn groups_partition_all_indices() {
    let mut seen = HashSet::new();
    for group in FingerGroup::ALL {
      for &index in group.indices() {
        assert!(seen.insert(index), "下标 {} 重复", index);
      }
    }
    assert_eq!(seen, (0..HAND_LANDMARK_COUNT).collect::<HashSet<_>>());
  }

  #[test]
  fn group_sizes_are_fixed() {
    let annotations = annotate(&landmarks(21)).unwrap();
    for (group, points) in annotations.iter() {
      let expected = if group == FingerGroup::PalmBase { 1 } else { 4 };
      assert_eq!(points.len(), expected, "{}", group.name());
    }
  }

  #[test]
  fn points_keep_listed_order() {
    let points = landmarks(21);
    let annotations = annotate(&points).unwrap();
    assert_eq!(annotations.palm_base, [points[0]]);
    assert_eq!(annotations.thumb, [points[1], points[2], points[3], points[4]]);
    assert_eq!(
      annotations.pinky,
      [points[17], points[18], points[19], points[20]]
    );
    for (group, grouped) in annotations.iter() {
      let expected: Vec<Point3> = group.indices().iter().map(|&i| points[i]).collect();
      assert_eq!(grouped, expected.as_slice());
    }
  }

  #[test]
  fn short_input_is_rejected() {
    assert_eq!(
      annotate(&landmarks(20)).unwrap_err(),
      AnnotateError::TooFewLandmarks {
        expected: 21,
        actual: 20
      }
    );
    assert!(annotate(&[]).is_err());
  }

  #[test]
  fn extra_points_are_ignored() {
    let points = landmarks(25);
    let annotations = annotate(&points).unwrap();
    assert_eq!(annotations.pinky[3], points[20]);
  }

  #[test]
  fn serializes_with_camel_case_group_names() {
    let value = serde_json::to_value(annotate(&landmarks(21)).unwrap()).unwrap();
    let object = value.as_object().unwrap();
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    let mut names: Vec<&str> = FingerGroup::ALL.iter().map(|g| g.name()).collect();
    names.sort_unstable();
    assert_eq!(keys, names);
  }
}
