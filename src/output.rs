// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

pub mod draw;
mod font;
mod label;

pub use self::draw::{Annotation, Draw, DrawBoxesOnImage, LabeledBox};
pub use self::font::{BitmapFont, LabelFont};
pub use self::label::{Palette, format_label};

const LABEL_FONT_SIZE: f32 = 14.0;
const BOX_THICKNESS: u32 = 2;
const LABEL_PADDING: u32 = 4;

/// 绘制参数
#[derive(Debug, Clone, PartialEq)]
pub struct DrawConfig {
  /// 优先使用的 TrueType 字体
  pub font_path: Option<PathBuf>,
  pub font_size: f32,
  pub box_thickness: u32,
  /// 标签底色块比文本多出的像素
  pub label_padding: u32,
  /// 打开后逐框输出调试日志
  pub debug: bool,
}

impl Default for DrawConfig {
  fn default() -> Self {
    Self {
      font_path: None,
      font_size: LABEL_FONT_SIZE,
      box_thickness: BOX_THICKNESS,
      label_padding: LABEL_PADDING,
      debug: false,
    }
  }
}
