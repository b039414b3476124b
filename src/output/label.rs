// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/output/label.rs - 标签文本与配色
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::Rgb;

const PALETTE: [Rgb<u8>; 9] = [
  Rgb([255, 0, 0]),
  Rgb([0, 200, 0]),
  Rgb([0, 0, 255]),
  Rgb([255, 165, 0]),
  Rgb([128, 0, 128]),
  Rgb([0, 200, 200]),
  Rgb([255, 0, 255]),
  Rgb([200, 200, 0]),
  Rgb([0, 128, 128]),
];

/// 按序号循环取色
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
  colors: Vec<Rgb<u8>>,
}

impl Default for Palette {
  fn default() -> Self {
    Palette {
      colors: PALETTE.to_vec(),
    }
  }
}

impl Palette {
  pub fn len(&self) -> usize {
    self.colors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }

  pub fn color(&self, index: usize) -> Rgb<u8> {
    self.colors[index % self.colors.len()]
  }
}

/// 置信度在 `[0, 1]` 内显示为百分比，否则保留两位小数
pub fn format_label(label: &str, confidence: Option<f64>) -> String {
  let Some(confidence) = confidence else {
    return label.to_string();
  };

  let suffix = if (0.0..=1.0).contains(&confidence) {
    format!("{:.1}%", confidence * 100.0)
  } else {
    format!("{:.2}", confidence)
  };

  if label.is_empty() {
    suffix
  } else {
    format!("{} {}", label, suffix)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn confidence_formatting() {
    assert_eq!(format_label("Paraguas", Some(0.873)), "Paraguas 87.3%");
    assert_eq!(format_label("Nube", Some(3.2)), "Nube 3.20");
    assert_eq!(format_label("Nube", Some(1.0)), "Nube 100.0%");
    assert_eq!(format_label("", Some(0.5)), "50.0%");
    assert_eq!(format_label("Charco", None), "Charco");
  }

  #[test]
  fn palette_cycles() {
    let palette = Palette::default();
    assert_eq!(palette.len(), 9);
    assert_eq!(palette.color(0), palette.color(9));
    assert_ne!(palette.color(0), palette.color(1));
  }
}
