// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/resolve/letterbox.rs - Letterbox 坐标变换
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// 等比缩放并居中填充到模型输入空间的变换参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub gain: f64,
  pub pad_x: f64,
  pub pad_y: f64,
}

impl Letterbox {
  /// 真实图像 `real_w x real_h` 放入 `meta_w x meta_h` 空间时的变换
  pub fn fit(meta_w: f64, meta_h: f64, real_w: f64, real_h: f64) -> Self {
    let gain = (meta_w / real_w).min(meta_h / real_h);
    Letterbox {
      gain,
      pad_x: (meta_w - real_w * gain) / 2.0,
      pad_y: (meta_h - real_h * gain) / 2.0,
    }
  }

  /// 模型空间坐标 -> 真实图像坐标
  pub fn to_real(&self, (x, y): (f64, f64)) -> (f64, f64) {
    ((x - self.pad_x) / self.gain, (y - self.pad_y) / self.gain)
  }

  /// 反变换一个 `[x1, y1, x2, y2]` 框，并裁剪到 `[0, real_w] x [0, real_h]`
  pub fn invert_box(&self, bbox: [f64; 4], real_w: f64, real_h: f64) -> [f64; 4] {
    let (x1, y1) = self.to_real((bbox[0], bbox[1]));
    let (x2, y2) = self.to_real((bbox[2], bbox[3]));
    [
      x1.clamp(0.0, real_w),
      y1.clamp(0.0, real_h),
      x2.clamp(0.0, real_w),
      y2.clamp(0.0, real_h),
    ]
  }
}
