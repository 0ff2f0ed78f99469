// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  output::{
    Render,
    draw::{DrawHands, ToRgbImage, record_hands},
  },
  result::HandResult,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 保存绘制后的图像，或原图（`record` 模式）
pub enum DrawWrapper {
  Draw(DrawHands),
  Record,
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &PathBuf,
    frame: &RgbNhwcFrame,
    result: &[HandResult],
  ) -> Result<(), DirectoryRecordOutputError> {
    let image = match self {
      DrawWrapper::Draw(draw) => draw.draw_hands(frame, result),
      DrawWrapper::Record => frame.to_rgb_image(),
    };
    image.save(path)?;
    record_hands(result, path)?;

    Ok(())
  }
}

/// `folder:///dir[?record][&always]`，按日期分目录保存每一帧
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counters: Arc<Mutex<u16>>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let draw = if uri.query_pairs().any(|(k, _)| k == "record") {
      DrawWrapper::Record
    } else {
      DrawWrapper::Draw(DrawHands::default())
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw,
      frame_counters: Arc::new(Mutex::new(0)),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counters
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RgbNhwcFrame, [HandResult]> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbNhwcFrame, result: &[HandResult]) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("本帧没有手部结果，跳过记录");
      return Ok(());
    }

    let path = self.frame_path()?;
    self.draw.save_result(&path, frame, result)?;
    debug!("记录帧: {}", path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use url::Url;

  fn files_with_extension(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          pending.push(path);
        } else if path.extension().is_some_and(|ext| ext == extension) {
          found.push(path);
        }
      }
    }
    found
  }

  #[test]
  fn skips_empty_frames_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = RgbNhwcFrame::with_shape(4, 4);

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    DirectoryRecordOutput::from_url(&url)
      .unwrap()
      .render_result(&frame, &[])
      .unwrap();
    assert!(files_with_extension(dir.path(), "png").is_empty());

    let url = Url::parse(&format!("folder://{}?record&always", dir.path().display())).unwrap();
    DirectoryRecordOutput::from_url(&url)
      .unwrap()
      .render_result(&frame, &[])
      .unwrap();
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
    assert_eq!(files_with_extension(dir.path(), "json").len(), 1);
  }

  #[test]
  fn frame_ids_increase() {
    let url = Url::parse("folder:///tmp/unused").unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.frame_id(), 1);
    assert_eq!(output.frame_id(), 2);
  }
}
