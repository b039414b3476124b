// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/pipeline/alternative.rs - 查找未经标准化的原始图像
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

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::input::probe_dimensions;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp", "tif", "tiff"];

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
    .unwrap_or(false)
}

fn same_file(a: &Path, b: &Path) -> bool {
  match (a.canonicalize(), b.canonicalize()) {
    (Ok(a), Ok(b)) => a == b,
    _ => a == b,
  }
}

/// 在 `dir` 中查找与 `stem` 同名、尺寸不同于 `meta` 的图像。
///
/// 面积最大者优先，其次是较长边更长者，再其次按路径排序取第一个。
pub fn find_alternative(
  dir: &Path,
  stem: &str,
  current: &Path,
  meta: (u32, u32),
) -> Option<(PathBuf, (u32, u32))> {
  let entries = std::fs::read_dir(dir).ok()?;
  let mut candidates: Vec<PathBuf> = entries
    .filter_map(Result::ok)
    .map(|entry| entry.path())
    .filter(|p| p.is_file() && is_image(p))
    .filter(|p| p.file_stem().and_then(|s| s.to_str()) == Some(stem))
    .filter(|p| !same_file(p, current))
    .collect();
  candidates.sort();

  let mut best: Option<(PathBuf, (u32, u32))> = None;
  for path in candidates {
    let dims = match probe_dimensions(&path) {
      Ok(dims) => dims,
      Err(e) => {
        debug!("无法读取候选图像 {}: {}", path.display(), e);
        continue;
      }
    };
    if dims == meta {
      continue;
    }
    let key = |(w, h): (u32, u32)| (w as u64 * h as u64, w.max(h));
    let better = match &best {
      Some((_, best_dims)) => key(dims) > key(*best_dims),
      None => true,
    };
    if better {
      best = Some((path, dims));
    }
  }
  best
}
