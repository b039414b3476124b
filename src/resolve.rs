// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/resolve.rs - 检测框坐标解析
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;

use crate::detection::{CoordinateIssue, Detection, RawCoordinates, as_number};

mod letterbox;
mod units;

pub use self::letterbox::Letterbox;
pub use self::units::{BoxLayout, UnitRegime};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
  #[error("缺少坐标字段")]
  MissingCoordinates,
  #[error("坐标无法解析: {0}")]
  InvalidBbox(String),
  #[error("图像尺寸无效: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
  #[error("裁剪后检测框退化: ({x1}, {y1}, {x2}, {y2})")]
  Degenerate { x1: i64, y1: i64, x2: i64, y2: i64 },
}

impl From<CoordinateIssue> for ResolveError {
  fn from(issue: CoordinateIssue) -> Self {
    match issue {
      CoordinateIssue::Missing => ResolveError::MissingCoordinates,
      CoordinateIssue::Malformed(msg) => ResolveError::InvalidBbox(msg),
    }
  }
}

/// 真实图像像素坐标系下的矩形，满足 `x1 < x2`、`y1 < y2`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  x1: u32,
  y1: u32,
  x2: u32,
  y2: u32,
}

impl PixelRect {
  /// 退化矩形返回 `None`
  pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Self> {
    (x2 > x1 && y2 > y1).then_some(PixelRect { x1, y1, x2, y2 })
  }

  pub fn x1(&self) -> u32 {
    self.x1
  }

  pub fn y1(&self) -> u32 {
    self.y1
  }

  pub fn x2(&self) -> u32 {
    self.x2
  }

  pub fn y2(&self) -> u32 {
    self.y2
  }

  pub fn width(&self) -> u32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> u32 {
    self.y2 - self.y1
  }

  pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
    (self.x1, self.y1, self.x2, self.y2)
  }
}

/// 检测所在的模型空间如何映射回真实图像
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetaCorrection {
  /// 模型空间与真实图像同尺寸
  Identity,
  /// 正方形模型输入，等比缩放加居中填充
  Letterbox(Letterbox),
  /// 非正方形模型空间，逐轴缩放
  Stretch { sx: f64, sy: f64 },
  /// 模型空间尺寸无法转换为数值，原样取整
  Unconverted,
}

/// 坐标格式判定结果，按优先级从上到下尝试。
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateSpace {
  LetterboxSpace {
    meta: Option<(f64, f64)>,
    correction: MetaCorrection,
    /// 数值为归一化分数时，先按该排布放大到模型空间
    normalized: Option<BoxLayout>,
  },
  NormalizedFraction(BoxLayout),
  Percentage,
  AbsolutePixels,
  MixedUnits,
  Unresolvable(ResolveError),
}

/// 一次坐标解析的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
  pub rect: PixelRect,
  pub space: CoordinateSpace,
  pub raw: RawCoordinates,
}

impl Resolution {
  /// 结果与原始数值直接截断取整不同，即发生了缩放或 letterbox 修正
  pub fn is_scaled(&self) -> bool {
    let ours = self.rect.as_tuple();
    let ours = [ours.0, ours.1, ours.2, ours.3];
    self
      .raw
      .values()
      .iter()
      .zip(ours)
      .any(|(raw, got)| raw.trunc() as i64 != got as i64)
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateResolver {
  fallback_meta: Option<(f64, f64)>,
}

fn nonzero_meta(w: f64, h: f64) -> Option<(f64, f64)> {
  (w.is_finite() && h.is_finite() && w != 0.0 && h != 0.0).then_some((w, h))
}

impl CoordinateResolver {
  /// 检测本身没有模型空间尺寸时使用的默认尺寸（例如清单记录中的 `image_width`/`image_height`）
  pub fn with_fallback_meta(mut self, width: f64, height: f64) -> Self {
    self.fallback_meta = nonzero_meta(width, height);
    self
  }

  /// 判定检测坐标所处的空间
  pub fn classify(&self, detection: &Detection, width: u32, height: u32) -> CoordinateSpace {
    let raw = match detection.raw_coordinates() {
      Ok(raw) => raw,
      Err(issue) => return CoordinateSpace::Unresolvable(issue.into()),
    };
    self.classify_raw(detection, &raw, width, height)
  }

  fn classify_raw(
    &self,
    detection: &Detection,
    raw: &RawCoordinates,
    width: u32,
    height: u32,
  ) -> CoordinateSpace {
    let values = match raw {
      // 具名字段只走单位判定
      RawCoordinates::Named(v) => {
        return match units::classify(*v) {
          UnitRegime::Normalized => CoordinateSpace::NormalizedFraction(BoxLayout::Corners),
          regime => from_regime(regime),
        };
      }
      RawCoordinates::Array(v) => *v,
    };

    match self.meta_space(detection) {
      Some(Ok((mw, mh))) => {
        let correction = meta_correction(mw, mh, width as f64, height as f64);
        CoordinateSpace::LetterboxSpace {
          meta: Some((mw, mh)),
          correction,
          normalized: units::is_normalized(values).then(|| BoxLayout::detect(values)),
        }
      }
      Some(Err(())) => CoordinateSpace::LetterboxSpace {
        meta: None,
        correction: MetaCorrection::Unconverted,
        normalized: None,
      },
      None => match units::classify(values) {
        UnitRegime::Normalized => CoordinateSpace::NormalizedFraction(BoxLayout::detect(values)),
        regime => from_regime(regime),
      },
    }
  }

  /// `None` 表示没有可用的模型空间，`Some(Err)` 表示字段存在但无法转换。
  fn meta_space(&self, detection: &Detection) -> Option<Result<(f64, f64), ()>> {
    if let Some((w, h)) = detection.meta_values() {
      return match (as_number(w), as_number(h)) {
        // 零尺寸视同缺失
        (Some(w), Some(h)) => nonzero_meta(w, h).map(Ok).or_else(|| self.fallback_meta.map(Ok)),
        _ => Some(Err(())),
      };
    }
    self.fallback_meta.map(Ok)
  }

  /// 将检测解析为真实图像上的像素矩形
  pub fn resolve(
    &self,
    detection: &Detection,
    width: u32,
    height: u32,
  ) -> Result<Resolution, ResolveError> {
    if width == 0 || height == 0 {
      return Err(ResolveError::EmptyImage { width, height });
    }

    let raw = detection.raw_coordinates()?;
    let space = self.classify_raw(detection, &raw, width, height);
    let corners = apply_space(&space, raw.values(), width as f64, height as f64)?;
    let rect = finalize(corners, width, height)?;

    Ok(Resolution { rect, space, raw })
  }
}

fn from_regime(regime: UnitRegime) -> CoordinateSpace {
  match regime {
    UnitRegime::Normalized => CoordinateSpace::NormalizedFraction(BoxLayout::Corners),
    UnitRegime::Percentage => CoordinateSpace::Percentage,
    UnitRegime::Absolute => CoordinateSpace::AbsolutePixels,
    UnitRegime::Mixed => CoordinateSpace::MixedUnits,
  }
}

fn meta_correction(mw: f64, mh: f64, rw: f64, rh: f64) -> MetaCorrection {
  let (imw, imh) = (mw.round() as i64, mh.round() as i64);
  if imw == rw as i64 && imh == rh as i64 {
    MetaCorrection::Identity
  } else if imw == imh {
    MetaCorrection::Letterbox(Letterbox::fit(mw, mh, rw, rh))
  } else {
    MetaCorrection::Stretch {
      sx: rw / mw,
      sy: rh / mh,
    }
  }
}

fn apply_space(
  space: &CoordinateSpace,
  v: [f64; 4],
  w: f64,
  h: f64,
) -> Result<[f64; 4], ResolveError> {
  let out = match space {
    CoordinateSpace::LetterboxSpace {
      meta,
      correction,
      normalized,
    } => {
      let points = match (normalized, meta) {
        (Some(layout), Some((mw, mh))) => units::scale(layout.to_corners(v), *mw, *mh),
        _ => v,
      };
      match correction {
        MetaCorrection::Identity | MetaCorrection::Unconverted => points,
        MetaCorrection::Letterbox(lb) => lb.invert_box(points, w, h),
        MetaCorrection::Stretch { sx, sy } => units::scale(points, *sx, *sy),
      }
    }
    CoordinateSpace::NormalizedFraction(layout) => units::scale(layout.to_corners(v), w, h),
    CoordinateSpace::Percentage => units::scale(v, w / 100.0, h / 100.0),
    CoordinateSpace::AbsolutePixels => v,
    CoordinateSpace::MixedUnits => units::per_value(v, w, h),
    CoordinateSpace::Unresolvable(err) => return Err(err.clone()),
  };
  Ok(out)
}

/// 四舍五入（远离零）并裁剪到 `[0, w-1] x [0, h-1]`
fn finalize(v: [f64; 4], width: u32, height: u32) -> Result<PixelRect, ResolveError> {
  let max_x = width as i64 - 1;
  let max_y = height as i64 - 1;
  let x1 = (v[0].round() as i64).clamp(0, max_x);
  let y1 = (v[1].round() as i64).clamp(0, max_y);
  let x2 = (v[2].round() as i64).clamp(0, max_x);
  let y2 = (v[3].round() as i64).clamp(0, max_y);

  PixelRect::new(x1 as u32, y1 as u32, x2 as u32, y2 as u32)
    .ok_or(ResolveError::Degenerate { x1, y1, x2, y2 })
}
