// 该文件是 Shanan （山南西风） 项目的一部分。
// src/coords.rs - 检测框坐标换算
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

use crate::pipeline::DetectionBox;

/// 把检测框换算为 `(像素框, 归一化框)`，两者均为 `[x, y, w, h]`
///
/// 像素框的每条边分别裁剪到 `[0, W] x [0, H]`，宽高不再额外下限到 0；
/// 归一化框直接由未裁剪的角点除以图像尺寸得到，可能越出 [0, 1]。
/// 没有检测框时两者都是全零。
pub fn normalize_box(
  bbox: Option<&DetectionBox>,
  image_width: f32,
  image_height: f32,
) -> ([f32; 4], [f32; 4]) {
  let Some(DetectionBox {
    top_left: [x0, y0],
    bottom_right: [x1, y1],
  }) = bbox.copied()
  else {
    return ([0.0; 4], [0.0; 4]);
  };

  let left = x0.max(0.0);
  let top = y0.max(0.0);
  let pixel = [
    left,
    top,
    image_width.min(x1) - left,
    image_height.min(y1) - top,
  ];

  let raw = [
    x0 / image_width,
    y0 / image_height,
    (x1 - x0) / image_width,
    (y1 - y0) / image_height,
  ];

  (pixel, raw)
}
