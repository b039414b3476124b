// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/input.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 解码后的原始图像及其 EXIF 方向。
///
/// 像素保持文件中的存储方向，绘制前再按 `orientation` 转正。
#[derive(Debug, Clone)]
pub struct SourceImage {
  image: DynamicImage,
  orientation: Orientation,
}

impl SourceImage {
  pub fn new(image: DynamicImage, orientation: Orientation) -> Self {
    Self { image, orientation }
  }

  pub fn image(&self) -> &DynamicImage {
    &self.image
  }

  pub fn orientation(&self) -> Orientation {
    self.orientation
  }

  /// 转正后的宽高
  pub fn dimensions(&self) -> (u32, u32) {
    oriented(self.image.width(), self.image.height(), self.orientation)
  }

  /// 复制一份并按 EXIF 方向转正，原图不变
  pub fn to_oriented(&self) -> DynamicImage {
    let mut image = self.image.clone();
    if self.orientation != Orientation::NoTransforms {
      image.apply_orientation(self.orientation);
    }
    image
  }
}

impl From<DynamicImage> for SourceImage {
  fn from(image: DynamicImage) -> Self {
    SourceImage::new(image, Orientation::NoTransforms)
  }
}

fn oriented(width: u32, height: u32, orientation: Orientation) -> (u32, u32) {
  match orientation {
    Orientation::Rotate90
    | Orientation::Rotate270
    | Orientation::Rotate90FlipH
    | Orientation::Rotate270FlipH => (height, width),
    _ => (width, height),
  }
}

/// 读取图像文件并记录 EXIF 方向
pub fn read_image_file(path: impl AsRef<Path>) -> Result<SourceImage, InputError> {
  let path = path.as_ref();
  let mut decoder = ImageReader::open(path)?
    .with_guessed_format()?
    .into_decoder()?;
  let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
  if orientation != Orientation::NoTransforms {
    debug!("{} EXIF 方向: {:?}", path.display(), orientation);
  }
  let image = DynamicImage::from_decoder(decoder)?;
  Ok(SourceImage::new(image, orientation))
}

/// 只读文件头获取转正后的宽高
pub fn probe_dimensions(path: impl AsRef<Path>) -> Result<(u32, u32), InputError> {
  let mut decoder = ImageReader::open(path.as_ref())?
    .with_guessed_format()?
    .into_decoder()?;
  let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
  let (width, height) = decoder.dimensions();
  Ok(oriented(width, height, orientation))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn rotated_dimensions_are_swapped() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
    let source = SourceImage::new(image, Orientation::Rotate90);
    assert_eq!(source.dimensions(), (30, 40));
    assert_eq!(source.to_oriented().width(), 30);
    // 原图未被旋转
    assert_eq!(source.image().width(), 40);
  }

  #[test]
  fn read_and_probe_png() {
    let dir = std::env::temp_dir().join(format!("lluvia-input-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("dibujo.png");
    RgbImage::from_pixel(64, 48, Rgb([200, 10, 10]))
      .save(&path)
      .unwrap();

    let source = read_image_file(&path).unwrap();
    assert_eq!(source.dimensions(), (64, 48));
    assert_eq!(source.orientation(), Orientation::NoTransforms);
    assert_eq!(probe_dimensions(&path).unwrap(), (64, 48));

    assert!(read_image_file(dir.join("missing.png")).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
