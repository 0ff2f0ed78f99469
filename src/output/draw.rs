// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 手部结果可视化
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

use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};

use crate::{
  annotate::{FingerGroup, HandAnnotations},
  frame::{ImageTensor, RgbNhwcFrame},
  pipeline::Point3,
  result::HandResult,
};

const BOX_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i32 = 2;
const POINT_RADIUS: i32 = 3;

fn finger_color(group: FingerGroup) -> [u8; 3] {
  match group {
    FingerGroup::PalmBase => [255, 255, 255],
    FingerGroup::Thumb => [255, 64, 64],
    FingerGroup::IndexFinger => [255, 192, 0],
    FingerGroup::MiddleFinger => [64, 255, 64],
    FingerGroup::RingFinger => [0, 192, 255],
    FingerGroup::Pinky => [192, 64, 255],
  }
}

pub struct DrawHands {
  box_color: [u8; 3],
  box_thickness: i32,
  point_radius: i32,
}

impl Default for DrawHands {
  fn default() -> Self {
    Self {
      box_color: BOX_COLOR,
      box_thickness: BOX_THICKNESS,
      point_radius: POINT_RADIUS,
    }
  }
}

impl DrawHands {
  // bbox 为像素坐标 [x, y, w, h]
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[f32; 4]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = ((bbox[0] + bbox[2]).ceil() as i32).clamp(0, w - 1);
    let y_max = ((bbox[1] + bbox[3]).ceil() as i32).clamp(0, h - 1);

    for thickness in 0..self.box_thickness {
      let width = x_max - x_min - 2 * thickness;
      let height = y_max - y_min - 2 * thickness;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = imageproc::rect::Rect::at(x_min + thickness, y_min + thickness)
        .of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(self.box_color));
    }
  }

  fn draw_skeleton(&self, image: &mut RgbImage, annotations: &HandAnnotations) {
    let [palm] = annotations.palm_base;
    for (group, points) in annotations.iter() {
      let color = Rgb(finger_color(group));
      let mut previous: Point3 = palm;
      for point in points {
        if group != FingerGroup::PalmBase {
          draw_line_segment_mut(
            image,
            (previous[0], previous[1]),
            (point[0], point[1]),
            color,
          );
        }
        previous = *point;
      }
      for point in points {
        draw_filled_circle_mut(
          image,
          (point[0].round() as i32, point[1].round() as i32),
          self.point_radius,
          color,
        );
      }
    }
  }

  pub fn draw_hands_on_image(&self, image: &mut RgbImage, hands: &[HandResult]) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }
    for hand in hands {
      self.draw_bbox(image, &hand.bbox);
      if let Some(annotations) = &hand.annotations {
        self.draw_skeleton(image, annotations);
      }
    }
  }

  pub fn draw_hands<F: ToRgbImage>(&self, frame: &F, hands: &[HandResult]) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_hands_on_image(&mut image, hands);
    image
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for RgbNhwcFrame {
  fn to_rgb_image(&self) -> RgbImage {
    let width = self.width() as u32;
    let height = self.height() as u32;
    let data = self.as_nhwc();

    // 将 NHWC 转为 RGB 图像
    ImageBuffer::from_fn(width, height, |x, y| {
      let idx = (y as usize * width as usize + x as usize) * 3;
      Rgb([data[idx], data[idx + 1], data[idx + 2]])
    })
  }
}

/// 把手部结果写成 JSON，与图像同名、扩展名为 `.json`
pub fn record_hands(hands: &[HandResult], path: &Path) -> Result<(), std::io::Error> {
  let text = serde_json::to_string_pretty(hands).map_err(std::io::Error::other)?;
  std::fs::write(path.with_extension("json"), text)
}
