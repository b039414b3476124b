// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/output/font.rs - 标签字体
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

const SYSTEM_FONTS: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
  "/Library/Fonts/Arial.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "/System/Library/Fonts/Helvetica.ttc",
  "C:\\Windows\\Fonts\\arial.ttf",
];

// 估算文本宽度时每字符宽度与字号之比（粗略估计）
const CHAR_WIDTH_RATIO: f32 = 0.6;

/// 无法测量时按字符数估算文本尺寸
fn estimate_text_size(count: usize, scale: PxScale) -> (u32, u32) {
  (
    (count as f32 * scale.x * CHAR_WIDTH_RATIO).ceil() as u32,
    scale.y.ceil() as u32,
  )
}

// 内置点阵字体：每个字形 3x5，每行低 3 位有效，最高位在左
const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;
const GLYPH_BASE_SIZE: f32 = 7.0;

fn glyph(c: char) -> [u8; 5] {
  match c {
    '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
    '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
    '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
    '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
    '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
    '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
    '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
    '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
    '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
    '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
    'A' => [0b010, 0b101, 0b111, 0b101, 0b101],
    'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
    'C' => [0b011, 0b100, 0b100, 0b100, 0b011],
    'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
    'E' => [0b111, 0b100, 0b110, 0b100, 0b111],
    'F' => [0b111, 0b100, 0b110, 0b100, 0b100],
    'G' => [0b011, 0b100, 0b101, 0b101, 0b011],
    'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
    'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
    'J' => [0b001, 0b001, 0b001, 0b101, 0b010],
    'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
    'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
    'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
    'N' => [0b110, 0b101, 0b101, 0b101, 0b101],
    'O' => [0b010, 0b101, 0b101, 0b101, 0b010],
    'P' => [0b110, 0b101, 0b110, 0b100, 0b100],
    'Q' => [0b010, 0b101, 0b101, 0b110, 0b011],
    'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
    'S' => [0b011, 0b100, 0b010, 0b001, 0b110],
    'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
    'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
    'V' => [0b101, 0b101, 0b101, 0b101, 0b010],
    'W' => [0b101, 0b101, 0b111, 0b111, 0b101],
    'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
    'Y' => [0b101, 0b101, 0b010, 0b010, 0b010],
    'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
    '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
    ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
    '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
    '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
    '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
    ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
    '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
    ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
    '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
    '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
    '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
    '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
    ' ' => [0b000; 5],
    _ => [0b111, 0b001, 0b010, 0b000, 0b010], // '?'
  }
}

// 去掉常见西语重音后转大写
fn fold(c: char) -> char {
  match c {
    'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'A',
    'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'E',
    'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
    'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
    'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
    'ñ' | 'Ñ' => 'N',
    c => c.to_ascii_uppercase(),
  }
}

/// 内置点阵字体，任何环境下都可用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitmapFont {
  cell: u32,
}

impl BitmapFont {
  pub fn with_size(size: f32) -> Self {
    let cell = (size / GLYPH_BASE_SIZE).round().max(1.0) as u32;
    BitmapFont { cell }
  }

  fn advance(&self) -> u32 {
    (GLYPH_W + 1) * self.cell
  }

  pub fn measure(&self, text: &str) -> (u32, u32) {
    let count = text.chars().count() as u32;
    if count == 0 {
      return (0, 0);
    }
    (count * self.advance() - self.cell, GLYPH_H * self.cell)
  }

  pub fn draw(&self, image: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
    let cell = self.cell as i32;
    for (i, c) in text.chars().enumerate() {
      let origin_x = x + i as i32 * self.advance() as i32;
      for (row, bits) in glyph(fold(c)).iter().enumerate() {
        for col in 0..GLYPH_W {
          if bits & (0b100 >> col) == 0 {
            continue;
          }
          let rect = Rect::at(origin_x + col as i32 * cell, y + row as i32 * cell)
            .of_size(self.cell, self.cell);
          draw_filled_rect_mut(image, rect, color);
        }
      }
    }
  }
}

/// 标签字体：系统 TrueType 字体，找不到时退回内置点阵字体
pub enum LabelFont {
  TrueType {
    font: FontVec,
    scale: PxScale,
    source: PathBuf,
  },
  Bitmap(BitmapFont),
}

impl std::fmt::Debug for LabelFont {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      LabelFont::TrueType { scale, source, .. } => f
        .debug_struct("TrueType")
        .field("scale", &scale.y)
        .field("source", source)
        .finish(),
      LabelFont::Bitmap(bitmap) => f.debug_tuple("Bitmap").field(bitmap).finish(),
    }
  }
}

fn try_load(path: &Path) -> Option<FontVec> {
  let data = std::fs::read(path).ok()?;
  match FontVec::try_from_vec(data) {
    Ok(font) => Some(font),
    Err(e) => {
      warn!("无法解析字体文件 {}: {}", path.display(), e);
      None
    }
  }
}

impl LabelFont {
  pub fn bitmap(size: f32) -> Self {
    LabelFont::Bitmap(BitmapFont::with_size(size))
  }

  /// 依次尝试指定字体与系统字体，全部失败时使用内置点阵字体
  pub fn load_or_fallback(preferred: Option<&Path>, size: f32) -> Self {
    let candidates = preferred
      .into_iter()
      .map(Path::to_path_buf)
      .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

    for path in candidates {
      if let Some(font) = try_load(&path) {
        info!("加载标签字体: {}", path.display());
        return LabelFont::TrueType {
          font,
          scale: PxScale::from(size),
          source: path,
        };
      }
      debug!("字体不可用: {}", path.display());
    }

    warn!("未找到可用的 TrueType 字体，使用内置点阵字体");
    LabelFont::bitmap(size)
  }

  /// 文本宽高；TrueType 测量结果为空时按字符数估算
  pub fn measure(&self, text: &str) -> (u32, u32) {
    match self {
      LabelFont::TrueType { font, scale, .. } => {
        let (w, h) = text_size(*scale, font, text);
        if text.is_empty() || (w > 0 && h > 0) {
          (w, h)
        } else {
          estimate_text_size(text.chars().count(), *scale)
        }
      }
      LabelFont::Bitmap(bitmap) => bitmap.measure(text),
    }
  }

  pub fn draw(&self, image: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
    match self {
      LabelFont::TrueType { font, scale, .. } => {
        draw_text_mut(image, color, x, y, *scale, font, text)
      }
      LabelFont::Bitmap(bitmap) => bitmap.draw(image, color, x, y, text),
    }
  }
}
