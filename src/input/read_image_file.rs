// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbNhwcFrame};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

fn check_scheme(url: &Url, expected: &str) -> Result<(), ImageFileInputError> {
  if url.scheme() != expected {
    error!(
      "URI scheme mismatch: expected '{}', found '{}'",
      expected,
      url.scheme()
    );
    return Err(ImageFileInputError::SchemaMismatch);
  }
  Ok(())
}

fn read_image(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  let image = ImageReader::open(path)?.decode()?;
  debug!(
    "读取图像: {} ({}x{})",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(image.into_rgb8())
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut frame = RgbNhwcFrame::with_shape(height as usize, width as usize);
    // RgbImage 的行主序交错 RGB 布局即 NHWC
    frame.as_mut().copy_from_slice(image.as_raw());
    frame
  }
}

/// 单张图像输入：`image:///path/to/file.png`
pub struct ImageFileInput {
  image: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;
    let image = read_image(Path::new(url.path()))?;

    Ok(ImageFileInput { image: Some(image) })
  }
}

impl Iterator for ImageFileInput {
  type Item = RgbNhwcFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take().map(RgbNhwcFrame::from)
  }
}

/// 目录输入：`folder:///path/to/dir`，按文件名顺序读取其中的图像
pub struct FolderInput {
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;

    let mut files = Vec::new();
    for entry in std::fs::read_dir(url.path())? {
      let path = entry?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();
    debug!("目录 {} 中共有 {} 张图像", url.path(), files.len());

    Ok(FolderInput {
      pending: files.into(),
    })
  }
}

impl Iterator for FolderInput {
  type Item = RgbNhwcFrame;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      match read_image(&path) {
        Ok(image) => return Some(image.into()),
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::ImageTensor;
  use image::Rgb;

  fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 7]))
      .save(&path)
      .unwrap();
    path
  }

  #[test]
  fn reads_single_image_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "hand.png", 3, 2);
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();

    let mut input = ImageFileInput::from_url(&url).unwrap();
    let frame = input.next().unwrap();
    assert_eq!(frame.shape(), [1, 2, 3, 3]);
    // 像素 (x=1, y=1) 位于 NHWC 下标 (1 * 3 + 1) * 3
    assert_eq!(&frame.as_nhwc()[12..15], &[1, 1, 7]);
    assert!(input.next().is_none());
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("video:///tmp/a.mp4").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }

  #[test]
  fn folder_yields_images_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_png(dir.path(), "b.png", 2, 2);
    write_png(dir.path(), "a.png", 4, 4);
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    std::fs::write(dir.path().join("broken.jpg"), "not a jpeg").unwrap();

    let url = Url::parse(&format!("folder://{}", dir.path().display())).unwrap();
    let widths: Vec<usize> = FolderInput::from_url(&url)
      .unwrap()
      .map(|frame| frame.width())
      .collect();
    assert_eq!(widths, vec![4, 2]);
  }
}
