// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/pipeline.rs - 批量提取指标并绘制检测框
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

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  input::{SourceImage, read_image_file},
  output::Draw,
  resolve::CoordinateResolver,
};

mod alternative;
mod manifest;

pub use self::alternative::find_alternative;
pub use self::manifest::{Manifest, ManifestRecord};

pub const SUMMARY_FILENAME: &str = "metadata_processing_summary.json";
pub const BBOXES_DIR: &str = "bboxes";

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("清单文件不存在: {0}")]
  ManifestNotFound(PathBuf),
  #[error("清单格式错误: {0}")]
  ManifestFormat(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 单张图像的处理摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
  pub image_filename: String,
  pub indicators_saved: usize,
  pub indicators_path: String,
  pub bboxes_drawn: bool,
  pub bboxes_path: Option<String>,
  pub bboxes_scaled: bool,
}

pub struct BatchPipeline {
  draw: Draw,
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PipelineError> {
  let text = serde_json::to_string_pretty(value)?;
  std::fs::write(path, text)?;
  Ok(())
}

/// 输出文件名前缀，通常为主干名；同一批次内主干名重复时改用完整文件名
fn output_name(record: &ManifestRecord, used: &mut HashSet<String>) -> String {
  let stem = record.stem();
  if used.insert(stem.clone()) {
    return stem;
  }
  let mut name = record.image_filename.clone();
  warn!(
    "{}: 主干名 {} 已被使用, 输出改用 {}",
    record.image_filename, stem, name
  );
  let mut n = 1;
  while !used.insert(name.clone()) {
    name = format!("{}_{}", record.image_filename, n);
    n += 1;
  }
  name
}

impl BatchPipeline {
  pub fn new(draw: Draw) -> Self {
    Self { draw }
  }

  /// 处理整个清单，按清单顺序返回并写出摘要。
  ///
  /// 只有清单本身读取失败或输出目录无法创建时才返回错误，单张图像的失败记录在摘要中。
  pub fn process(
    &self,
    metadata_path: &Path,
    output_dir: &Path,
  ) -> Result<Vec<ImageSummary>, PipelineError> {
    let manifest = Manifest::load(metadata_path)?;
    info!(
      "读取清单 {}: {} 条记录",
      metadata_path.display(),
      manifest.records.len()
    );

    let metadata_dir = match metadata_path.parent() {
      Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
      _ => PathBuf::from("."),
    };
    let bboxes_dir = output_dir.join(BBOXES_DIR);
    std::fs::create_dir_all(&bboxes_dir)?;

    let mut used_names = HashSet::new();
    let summaries: Vec<ImageSummary> = manifest
      .records
      .iter()
      .map(|record| {
        let name = output_name(record, &mut used_names);
        self.process_record(record, &name, &metadata_dir, output_dir, &bboxes_dir)
      })
      .collect();

    let summary_path = output_dir.join(SUMMARY_FILENAME);
    write_json(&summary_path, &summaries)?;
    info!(
      "处理完成: {} 张图像, 摘要写入 {}",
      summaries.len(),
      summary_path.display()
    );

    Ok(summaries)
  }

  fn process_record(
    &self,
    record: &ManifestRecord,
    name: &str,
    metadata_dir: &Path,
    output_dir: &Path,
    bboxes_dir: &Path,
  ) -> ImageSummary {
    let extracts = record.indicator_extracts();
    let indicators_path = output_dir.join(format!("{}_indicators.json", name));
    let indicators_saved = match write_json(&indicators_path, &extracts) {
      Ok(()) => extracts.len(),
      Err(e) => {
        warn!("无法写入指标文件 {}: {}", indicators_path.display(), e);
        0
      }
    };

    let mut summary = ImageSummary {
      image_filename: record.image_filename.clone(),
      indicators_saved,
      indicators_path: indicators_path.display().to_string(),
      bboxes_drawn: false,
      bboxes_path: None,
      bboxes_scaled: false,
    };

    let Some(source) = self.load_source(record, metadata_dir, &record.stem()) else {
      return summary;
    };

    let mut resolver = CoordinateResolver::default();
    if let Some((w, h)) = record.meta_dimensions() {
      resolver = resolver.with_fallback_meta(w, h);
    }
    let annotation = self.draw.annotate(&source, &record.detections, &resolver);

    let bboxes_path = bboxes_dir.join(format!("{}_bboxes.png", name));
    match annotation.image.save(&bboxes_path) {
      Ok(()) => {
        info!(
          "{}: 绘制 {} 个检测框, 跳过 {} 个 -> {}",
          record.image_filename,
          annotation.boxes.len(),
          annotation.skipped,
          bboxes_path.display()
        );
        summary.bboxes_drawn = true;
        summary.bboxes_path = Some(bboxes_path.display().to_string());
        summary.bboxes_scaled = annotation.scaled;
      }
      Err(e) => warn!("无法保存标注图像 {}: {}", bboxes_path.display(), e),
    }

    summary
  }

  /// 找到并读取用于绘制的图像；
  /// 若其尺寸恰好等于模型空间尺寸，尝试换用同名的原始图像。
  fn load_source(
    &self,
    record: &ManifestRecord,
    metadata_dir: &Path,
    stem: &str,
  ) -> Option<SourceImage> {
    let Some(path) = record.locate_image(metadata_dir) else {
      warn!("{}: 找不到图像文件", record.image_filename);
      return None;
    };

    let source = match read_image_file(&path) {
      Ok(source) => source,
      Err(e) => {
        warn!("{}: 无法读取图像 {}: {}", record.image_filename, path.display(), e);
        return None;
      }
    };

    let Some((mw, mh)) = record.meta_dimensions() else {
      return Some(source);
    };
    let meta = (mw.round() as u32, mh.round() as u32);
    if source.dimensions() != meta {
      return Some(source);
    }

    let Some((alternative, dims)) = find_alternative(metadata_dir, stem, &path, meta) else {
      return Some(source);
    };
    match read_image_file(&alternative) {
      Ok(original) => {
        info!(
          "{}: 图像尺寸与模型空间相同, 改用 {} ({}x{})",
          record.image_filename,
          alternative.display(),
          dims.0,
          dims.1
        );
        Some(original)
      }
      Err(e) => {
        warn!("无法读取替代图像 {}: {}", alternative.display(), e);
        Some(source)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::{DrawConfig, LabelFont};
  use image::{Rgb, RgbImage};

  fn pipeline() -> BatchPipeline {
    BatchPipeline::new(Draw::with_font(
      LabelFont::bitmap(14.0),
      &DrawConfig::default(),
    ))
  }

  fn workdir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lluvia-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn missing_image_is_recorded_not_fatal() {
    let dir = workdir("missing-image");
    let metadata = dir.join("metadata1.json");
    std::fs::write(
      &metadata,
      r#"[{ "image_filename": "ausente.png",
            "detections": [ { "bbox": [1, 2, 30, 40], "indicator_ids": [4] } ] }]"#,
    )
    .unwrap();

    let summaries = pipeline().process(&metadata, &dir).unwrap();
    assert_eq!(summaries.len(), 1);
    assert!(!summaries[0].bboxes_drawn);
    assert_eq!(summaries[0].bboxes_path, None);
    assert_eq!(summaries[0].indicators_saved, 1);
    assert!(dir.join(SUMMARY_FILENAME).is_file());
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn standardized_image_is_replaced_by_original() {
    let dir = workdir("alternative");
    RgbImage::from_pixel(640, 640, Rgb([10, 10, 10]))
      .save(dir.join("dibujo.png"))
      .unwrap();
    RgbImage::from_pixel(800, 600, Rgb([10, 10, 10]))
      .save(dir.join("dibujo.jpg"))
      .unwrap();
    let metadata = dir.join("metadata1.json");
    std::fs::write(
      &metadata,
      r#"[{ "image_filename": "dibujo.png", "image_width": 640, "image_height": 640,
            "detections": [ { "bbox": [270, 150, 370, 250], "nombre": "Nube" } ] }]"#,
    )
    .unwrap();

    let out = dir.join("out");
    let summaries = pipeline().process(&metadata, &out).unwrap();
    assert!(summaries[0].bboxes_drawn);
    assert!(summaries[0].bboxes_scaled);

    let drawn = image::open(out.join("bboxes/dibujo_bboxes.png"))
      .unwrap()
      .to_rgb8();
    assert_eq!(drawn.dimensions(), (800, 600));
    assert_ne!(*drawn.get_pixel(338, 88), Rgb([10, 10, 10]));
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn bad_detection_entry_keeps_the_image() {
    let dir = workdir("bad-entry");
    RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]))
      .save(dir.join("a.png"))
      .unwrap();
    let metadata = dir.join("metadata1.json");
    std::fs::write(
      &metadata,
      r#"[{ "image_filename": "a.png",
            "detections": [ { "bbox": [10, 10, 60, 60], "indicator_ids": [1] }, null ] }]"#,
    )
    .unwrap();

    let summaries = pipeline().process(&metadata, &dir).unwrap();
    assert_eq!(summaries.len(), 1);
    assert!(summaries[0].bboxes_drawn);
    assert_eq!(summaries[0].indicators_saved, 1);
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn repeated_stems_get_distinct_outputs() {
    let dir = workdir("same-stem");
    RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]))
      .save(dir.join("dibujo.png"))
      .unwrap();
    RgbImage::from_pixel(120, 80, Rgb([0, 0, 0]))
      .save(dir.join("dibujo.jpg"))
      .unwrap();
    let metadata = dir.join("metadata1.json");
    std::fs::write(
      &metadata,
      r#"[
        { "image_filename": "dibujo.png", "detections": [ { "bbox": [1, 1, 50, 50] } ] },
        { "image_filename": "dibujo.jpg", "detections": [ { "bbox": [1, 1, 50, 50] } ] }
      ]"#,
    )
    .unwrap();

    let summaries = pipeline().process(&metadata, &dir).unwrap();
    assert_ne!(summaries[0].indicators_path, summaries[1].indicators_path);
    assert_ne!(summaries[0].bboxes_path, summaries[1].bboxes_path);
    assert!(dir.join("dibujo_indicators.json").is_file());
    assert!(dir.join("dibujo.jpg_indicators.json").is_file());
    let second = image::open(dir.join("bboxes/dibujo.jpg_bboxes.png"))
      .unwrap()
      .to_rgb8();
    assert_eq!(second.dimensions(), (120, 80));
    std::fs::remove_dir_all(&dir).unwrap();
  }
}
