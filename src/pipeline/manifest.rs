// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/pipeline/manifest.rs - 元数据清单
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::detection::{Detection, IndicatorExtract, as_number};
use crate::pipeline::PipelineError;

/// 清单中的一条图像记录
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ManifestRecord {
  pub image_filename: String,
  pub image_original_path: Option<String>,
  pub image_width: Option<Value>,
  pub image_height: Option<Value>,
  #[serde(deserialize_with = "lenient_detections")]
  pub detections: Vec<Detection>,
}

/// 逐条转换检测，无法解析的条目被丢弃，记录本身保留
fn lenient_detections<'de, D>(deserializer: D) -> Result<Vec<Detection>, D::Error>
where
  D: Deserializer<'de>,
{
  let items = match Value::deserialize(deserializer)? {
    Value::Array(items) => items,
    Value::Null => return Ok(Vec::new()),
    other => {
      warn!("detections 不是数组, 按空列表处理: {}", other);
      return Ok(Vec::new());
    }
  };
  let mut detections = Vec::with_capacity(items.len());
  for (index, item) in items.into_iter().enumerate() {
    match serde_json::from_value::<Detection>(item) {
      Ok(detection) => detections.push(detection),
      Err(e) => warn!("跳过第 {} 条检测: {}", index, e),
    }
  }
  Ok(detections)
}

impl ManifestRecord {
  /// 输出文件名使用的主干名
  pub fn stem(&self) -> String {
    Path::new(&self.image_filename)
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| self.image_filename.clone())
  }

  /// 模型空间尺寸，两者都为非零数值时有效
  pub fn meta_dimensions(&self) -> Option<(f64, f64)> {
    let w = self.image_width.as_ref().and_then(as_number)?;
    let h = self.image_height.as_ref().and_then(as_number)?;
    (w > 0.0 && h > 0.0).then_some((w, h))
  }

  pub fn indicator_extracts(&self) -> Vec<IndicatorExtract> {
    self
      .detections
      .iter()
      .filter_map(IndicatorExtract::from_detection)
      .collect()
  }

  /// 依次尝试 `image_original_path` 与清单目录下的 `image_filename`
  pub fn locate_image(&self, metadata_dir: &Path) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(original) = self.image_original_path.as_deref().filter(|p| !p.is_empty()) {
      let original = PathBuf::from(original);
      if original.is_relative() {
        candidates.push(metadata_dir.join(&original));
      }
      candidates.insert(0, original);
    }
    if !self.image_filename.is_empty() {
      candidates.push(metadata_dir.join(&self.image_filename));
    }
    candidates.into_iter().find(|p| p.is_file())
  }
}

#[derive(Debug, Clone, Default)]
pub struct Manifest {
  pub records: Vec<ManifestRecord>,
}

impl Manifest {
  /// 文件不存在时返回 `ManifestNotFound`；无法解析的单条记录会被跳过
  pub fn load(path: &Path) -> Result<Self, PipelineError> {
    if !path.is_file() {
      return Err(PipelineError::ManifestNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    Self::parse(&text)
  }

  pub fn parse(text: &str) -> Result<Self, PipelineError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Array(items) = value else {
      return Err(PipelineError::ManifestFormat(
        "顶层必须是记录数组".to_string(),
      ));
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
      match serde_json::from_value::<ManifestRecord>(item) {
        Ok(record) if !record.image_filename.is_empty() => records.push(record),
        Ok(_) => warn!("跳过第 {} 条记录: 缺少 image_filename", index),
        Err(e) => warn!("跳过第 {} 条记录: {}", index, e),
      }
    }
    Ok(Manifest { records })
  }
}
