// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/output/draw.rs - 检测框与标签叠加绘制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use tracing::debug;

use crate::{
  detection::Detection,
  input::SourceImage,
  output::{DrawConfig, LabelFont, Palette, format_label},
  resolve::{CoordinateResolver, PixelRect},
};

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]); // 白色文本

/// 已解析的检测框及其标签
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledBox {
  pub rect: PixelRect,
  pub label: String,
}

/// 一张图像的绘制结果
#[derive(Debug, Clone)]
pub struct Annotation {
  pub image: RgbImage,
  pub boxes: Vec<LabeledBox>,
  /// 是否有检测框经过缩放或 letterbox 修正
  pub scaled: bool,
  /// 无法解析而被跳过的检测数
  pub skipped: usize,
}

pub trait DrawBoxesOnImage {
  /// 返回实际绘制的框数
  fn draw_boxes_on_image(&self, image: &mut RgbImage, boxes: &[LabeledBox]) -> usize;
}

pub struct Draw {
  font: LabelFont,
  palette: Palette,
  box_thickness: u32,
  label_padding: u32,
  debug: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(&DrawConfig::default())
  }
}

impl Draw {
  /// 按配置加载字体，只在构造时进行一次
  pub fn new(config: &DrawConfig) -> Self {
    let font = LabelFont::load_or_fallback(config.font_path.as_deref(), config.font_size);
    Self::with_font(font, config)
  }

  pub fn with_font(font: LabelFont, config: &DrawConfig) -> Self {
    Self {
      font,
      palette: Palette::default(),
      box_thickness: config.box_thickness.max(1),
      label_padding: config.label_padding,
      debug: config.debug,
    }
  }

  pub fn palette(&self) -> &Palette {
    &self.palette
  }

  fn draw_box(&self, image: &mut RgbImage, rect: &PixelRect, color: Rgb<u8>) {
    for t in 0..self.box_thickness {
      let w = (rect.width() + 1).saturating_sub(2 * t);
      let h = (rect.height() + 1).saturating_sub(2 * t);
      if w == 0 || h == 0 {
        break;
      }
      let r = Rect::at((rect.x1() + t) as i32, (rect.y1() + t) as i32).of_size(w, h);
      draw_hollow_rect_mut(image, r, color);
    }
  }

  // 标签底色块画在框左上角正上方，贴近图像顶部时放在 y = 0
  fn draw_label(&self, image: &mut RgbImage, rect: &PixelRect, label: &str, color: Rgb<u8>) {
    if label.is_empty() {
      return;
    }

    let (text_w, text_h) = self.font.measure(label);
    let chip_w = text_w + self.label_padding;
    let chip_h = text_h + self.label_padding;
    if chip_w == 0 || chip_h == 0 {
      return;
    }

    let chip_x = rect.x1() as i32;
    let chip_y = (rect.y1() as i32 - chip_h as i32).max(0);
    draw_filled_rect_mut(
      image,
      Rect::at(chip_x, chip_y).of_size(chip_w, chip_h),
      color,
    );

    let offset = (self.label_padding / 2) as i32;
    self
      .font
      .draw(image, TEXT_COLOR, chip_x + offset, chip_y + offset, label);
  }

  /// 在图像副本上绘制，先按 EXIF 方向转正，原图不变
  pub fn render(&self, source: &SourceImage, boxes: &[LabeledBox]) -> RgbImage {
    let mut image = source.to_oriented().to_rgb8();
    self.draw_boxes_on_image(&mut image, boxes);
    image
  }

  /// 解析全部检测并绘制，无法解析的检测直接跳过
  pub fn annotate(
    &self,
    source: &SourceImage,
    detections: &[Detection],
    resolver: &CoordinateResolver,
  ) -> Annotation {
    let (width, height) = source.dimensions();
    let mut boxes = Vec::with_capacity(detections.len());
    let mut scaled = false;
    let mut skipped = 0;

    for (index, detection) in detections.iter().enumerate() {
      match resolver.resolve(detection, width, height) {
        Ok(resolution) => {
          scaled |= resolution.is_scaled();
          if self.debug {
            debug!(
              "检测 {}: {:?} -> {:?} ({:?})",
              index,
              resolution.raw,
              resolution.rect.as_tuple(),
              resolution.space
            );
          }
          boxes.push(LabeledBox {
            rect: resolution.rect,
            label: format_label(&detection.label_text(), detection.confidence_value()),
          });
        }
        Err(e) => {
          skipped += 1;
          if self.debug {
            debug!("跳过检测 {}: {}", index, e);
          }
        }
      }
    }

    let image = self.render(source, &boxes);
    Annotation {
      image,
      boxes,
      scaled,
      skipped,
    }
  }
}

impl DrawBoxesOnImage for Draw {
  fn draw_boxes_on_image(&self, image: &mut RgbImage, boxes: &[LabeledBox]) -> usize {
    let (w, h) = image.dimensions();
    let visible: Vec<(usize, &LabeledBox)> = boxes
      .iter()
      .enumerate()
      .filter(|(_, b)| b.rect.x1() < w && b.rect.y1() < h)
      .collect();

    // 先画全部边框，再画标签，避免标签被后面的边框覆盖
    for (index, b) in visible.iter() {
      self.draw_box(image, &b.rect, self.palette.color(*index));
    }
    for (index, b) in visible.iter() {
      self.draw_label(image, &b.rect, &b.label, self.palette.color(*index));
    }

    if self.debug {
      debug!("绘制 {} / {} 个检测框", visible.len(), boxes.len());
    }
    visible.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::DynamicImage;
  use image::metadata::Orientation;
  use serde_json::{Value, json};

  const GRAY: Rgb<u8> = Rgb([90, 90, 90]);

  fn draw() -> Draw {
    Draw::with_font(LabelFont::bitmap(14.0), &DrawConfig::default())
  }

  fn source(w: u32, h: u32) -> SourceImage {
    SourceImage::from(DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, GRAY)))
  }

  fn labeled(x1: u32, y1: u32, x2: u32, y2: u32, label: &str) -> LabeledBox {
    LabeledBox {
      rect: PixelRect::new(x1, y1, x2, y2).unwrap(),
      label: label.to_string(),
    }
  }

  fn detections(values: Vec<Value>) -> Vec<Detection> {
    values
      .into_iter()
      .map(|v| serde_json::from_value(v).unwrap())
      .collect()
  }

  #[test]
  fn render_does_not_mutate_input() {
    let src = source(120, 90);
    let before = src.image().to_rgb8().into_raw();
    let out = draw().render(&src, &[labeled(20, 30, 80, 70, "Nube 87.3%")]);
    assert_eq!(src.image().to_rgb8().into_raw(), before);
    assert_ne!(out.as_raw(), &before);
    assert_eq!(out.dimensions(), (120, 90));
  }

  #[test]
  fn border_uses_cycling_palette() {
    let d = draw();
    let boxes = [labeled(10, 40, 30, 60, ""), labeled(50, 40, 70, 60, "")];
    let out = d.render(&source(100, 100), &boxes);
    assert_eq!(*out.get_pixel(10, 40), d.palette().color(0));
    assert_eq!(*out.get_pixel(30, 60), d.palette().color(0));
    assert_eq!(*out.get_pixel(50, 40), d.palette().color(1));
    assert_eq!(*out.get_pixel(11, 41), d.palette().color(0));
    // 内部保持原样
    assert_eq!(*out.get_pixel(20, 50), GRAY);
  }

  #[test]
  fn label_chip_sits_above_box() {
    let d = draw();
    let out = d.render(&source(100, 100), &[labeled(10, 50, 60, 90, "A")]);
    // "A" 宽高 6x10，加 4 像素后底色块为 10x14，位于 y = 36..50
    assert_eq!(*out.get_pixel(10, 36), d.palette().color(0));
    assert_eq!(*out.get_pixel(19, 49), d.palette().color(0));
    assert_eq!(*out.get_pixel(10, 35), GRAY);
    assert_eq!(*out.get_pixel(20, 40), GRAY);
  }

  #[test]
  fn label_chip_at_top_edge_moves_to_zero() {
    let d = draw();
    let out = d.render(&source(100, 100), &[labeled(10, 2, 60, 90, "A")]);
    assert_eq!(*out.get_pixel(19, 8), d.palette().color(0));
    assert_eq!(*out.get_pixel(19, 14), GRAY);
  }

  #[test]
  fn degenerate_detections_draw_nothing() {
    let d = draw();
    let src = source(200, 150);
    let dets = detections(vec![
      json!({ "bbox": [150, 120, 110, 130], "nombre": "Paraguas" }),
      json!({ "bbox": [300, 200, 400, 300] }),
      json!({ "bbox": ["x", 1, 2, 3] }),
    ]);
    let annotation = d.annotate(&src, &dets, &CoordinateResolver::default());
    assert!(annotation.boxes.is_empty());
    assert_eq!(annotation.skipped, 3);
    assert_eq!(annotation.image.as_raw(), src.image().to_rgb8().as_raw());
  }

  #[test]
  fn annotate_resolves_and_labels() {
    let d = draw();
    let src = source(800, 600);
    let dets = detections(vec![
      json!({ "bbox": [270, 150, 370, 250], "meta_w": 640, "meta_h": 640, "nombre": "Nube", "confianza": 0.873 }),
      json!({ "bbox": [0.1, 0.1, 0.2, 0.2], "label": "Charco" }),
    ]);
    let annotation = d.annotate(&src, &dets, &CoordinateResolver::default());
    assert!(annotation.scaled);
    assert_eq!(annotation.skipped, 0);
    assert_eq!(annotation.boxes[0].rect.as_tuple(), (338, 88, 463, 213));
    assert_eq!(annotation.boxes[0].label, "Nube 87.3%");
    assert_eq!(annotation.boxes[1].rect.as_tuple(), (80, 60, 160, 120));
    assert_eq!(*annotation.image.get_pixel(338, 88), d.palette().color(0));
    assert_eq!(*annotation.image.get_pixel(160, 120), d.palette().color(1));
  }

  #[test]
  fn orientation_is_applied_before_drawing() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, GRAY));
    let src = SourceImage::new(image, Orientation::Rotate90);
    let out = draw().render(&src, &[labeled(2, 25, 15, 35, "")]);
    assert_eq!(out.dimensions(), (20, 40));
    assert_eq!(*out.get_pixel(2, 25), draw().palette().color(0));
  }

  #[test]
  fn boxes_outside_image_are_not_counted() {
    let d = draw();
    let mut image = RgbImage::from_pixel(50, 50, GRAY);
    let drawn = d.draw_boxes_on_image(
      &mut image,
      &[labeled(10, 10, 20, 20, ""), labeled(60, 60, 70, 70, "")],
    );
    assert_eq!(drawn, 1);
  }
}
