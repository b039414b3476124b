// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/resolve/units.rs - 坐标单位与排布判定
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

const NORMALIZED_MAX: f64 = 1.0;
const PERCENT_MAX: f64 = 100.0;

/// 四个数值的排布方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxLayout {
  /// `[x1, y1, x2, y2]`
  Corners,
  /// `[x, y, width, height]`
  OriginSize,
}

impl BoxLayout {
  /// 合法的第二个角点不会小于第一个角点，否则视为宽高。
  pub fn detect(v: [f64; 4]) -> Self {
    if v[2] < v[0] || v[3] < v[1] {
      BoxLayout::OriginSize
    } else {
      BoxLayout::Corners
    }
  }

  pub fn to_corners(self, v: [f64; 4]) -> [f64; 4] {
    match self {
      BoxLayout::Corners => v,
      BoxLayout::OriginSize => [v[0], v[1], v[0] + v[2], v[1] + v[3]],
    }
  }
}

/// 四个数值整体所处的单位区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRegime {
  Normalized,
  Percentage,
  Absolute,
  Mixed,
}

pub fn is_normalized(v: [f64; 4]) -> bool {
  v.iter().all(|&x| x <= NORMALIZED_MAX)
}

pub fn classify(v: [f64; 4]) -> UnitRegime {
  let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let any_small = v.iter().any(|&x| x <= NORMALIZED_MAX);

  if max <= NORMALIZED_MAX {
    UnitRegime::Normalized
  } else if any_small {
    UnitRegime::Mixed
  } else if max <= PERCENT_MAX {
    UnitRegime::Percentage
  } else {
    UnitRegime::Absolute
  }
}

/// 按 `(w, h, w, h)` 逐轴缩放
pub fn scale(v: [f64; 4], w: f64, h: f64) -> [f64; 4] {
  [v[0] * w, v[1] * h, v[2] * w, v[3] * h]
}

/// 逐个数值判定单位：分数、百分比或像素。
pub fn per_value(v: [f64; 4], w: f64, h: f64) -> [f64; 4] {
  let axes = [w, h, w, h];
  let mut out = [0.0; 4];
  for ((slot, value), axis) in out.iter_mut().zip(v).zip(axes) {
    *slot = if value <= NORMALIZED_MAX {
      value * axis
    } else if value <= PERCENT_MAX {
      value / PERCENT_MAX * axis
    } else {
      value
    };
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn layout_detection() {
    assert_eq!(BoxLayout::detect([0.1, 0.2, 0.5, 0.6]), BoxLayout::Corners);
    assert_eq!(BoxLayout::detect([0.5, 0.4, 0.2, 0.3]), BoxLayout::OriginSize);
    assert_eq!(
      BoxLayout::OriginSize.to_corners([0.5, 0.4, 0.2, 0.3]),
      [0.5, 0.4, 0.7, 0.7]
    );
  }

  #[test]
  fn regimes() {
    assert_eq!(classify([0.0, 0.1, 0.9, 1.0]), UnitRegime::Normalized);
    assert_eq!(classify([10.0, 20.0, 55.0, 100.0]), UnitRegime::Percentage);
    assert_eq!(classify([10.0, 20.0, 300.0, 400.0]), UnitRegime::Absolute);
    assert_eq!(classify([0.25, 20.0, 300.0, 0.5]), UnitRegime::Mixed);
  }

  #[test]
  fn per_value_conversion() {
    let out = per_value([0.5, 50.0, 300.0, 0.75], 800.0, 400.0);
    assert_eq!(out, [400.0, 200.0, 300.0, 300.0]);
  }
}
