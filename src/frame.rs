// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use thiserror::Error;

const RGB_CHANNELS: usize = 3;

/// 输入图像张量，形状为 `[1, H, W, 3]`
pub trait ImageTensor {
  fn width(&self) -> usize;
  fn height(&self) -> usize;
  fn as_nhwc(&self) -> &[u8];

  fn shape(&self) -> [usize; 4] {
    [1, self.height(), self.width(), RGB_CHANNELS]
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct RgbNhwcFrame {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl RgbNhwcFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0u8; RGB_CHANNELS * width * height].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width * height;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }
}

impl ImageTensor for RgbNhwcFrame {
  fn width(&self) -> usize {
    self.width
  }

  fn height(&self) -> usize {
    self.height
  }

  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for RgbNhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}
