// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/detection.rs - 检测结果定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 上游检测模型输出的一条检测记录。
///
/// 字段格式不受本项目控制，所有字段都以原始 JSON 值保存，
/// 由访问方法按固定优先级解析。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Detection {
  pub bbox: Option<Value>,
  pub bbox_original: Option<Value>,

  pub x_min: Option<Value>,
  pub y_min: Option<Value>,
  pub x_max: Option<Value>,
  pub y_max: Option<Value>,

  pub meta_w: Option<Value>,
  pub meta_h: Option<Value>,
  pub image_width: Option<Value>,
  pub image_height: Option<Value>,
  pub meta_width: Option<Value>,
  pub meta_height: Option<Value>,

  pub base_label_yolo: Option<Value>,
  pub nombre: Option<Value>,
  pub label: Option<Value>,
  pub nombre_indicador: Option<Value>,

  pub confidence_base: Option<Value>,
  pub confianza: Option<Value>,
  pub confidence: Option<Value>,

  pub indicator_ids: Option<Value>,
  pub crop_filename: Option<Value>,
}

/// 坐标来源
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawCoordinates {
  /// `bbox` / `bbox_original` 数组
  Array([f64; 4]),
  /// `x_min` / `y_min` / `x_max` / `y_max` 字段
  Named([f64; 4]),
}

impl RawCoordinates {
  pub fn values(&self) -> [f64; 4] {
    match self {
      RawCoordinates::Array(v) | RawCoordinates::Named(v) => *v,
    }
  }
}

/// 坐标字段解析失败的原因
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateIssue {
  Missing,
  Malformed(String),
}

/// 将 JSON 值解析为有限浮点数，接受数字与数字字符串。
pub fn as_number(value: &Value) -> Option<f64> {
  let number = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => s.trim().parse::<f64>().ok()?,
    _ => return None,
  };
  number.is_finite().then_some(number)
}

fn present(value: &Option<Value>) -> Option<&Value> {
  value.as_ref().filter(|v| !v.is_null())
}

fn parse_bbox(value: &Value) -> Result<[f64; 4], CoordinateIssue> {
  let items = value
    .as_array()
    .ok_or_else(|| CoordinateIssue::Malformed(format!("bbox 不是数组: {}", value)))?;
  if items.len() != 4 {
    return Err(CoordinateIssue::Malformed(format!(
      "bbox 长度应为 4, 实际为 {}",
      items.len()
    )));
  }
  let mut out = [0.0; 4];
  for (slot, item) in out.iter_mut().zip(items) {
    *slot = as_number(item)
      .ok_or_else(|| CoordinateIssue::Malformed(format!("bbox 含非数值元素: {}", item)))?;
  }
  Ok(out)
}

impl Detection {
  /// 原始坐标：优先 `bbox`，其次 `bbox_original`，最后是四个具名字段。
  pub fn raw_coordinates(&self) -> Result<RawCoordinates, CoordinateIssue> {
    if let Some(bbox) = present(&self.bbox).or_else(|| present(&self.bbox_original)) {
      return parse_bbox(bbox).map(RawCoordinates::Array);
    }

    let named = [&self.x_min, &self.y_min, &self.x_max, &self.y_max];
    if named.iter().all(|v| present(v).is_none()) {
      return Err(CoordinateIssue::Missing);
    }
    let mut out = [0.0; 4];
    for (slot, field) in out.iter_mut().zip(named) {
      let value = present(field).ok_or(CoordinateIssue::Missing)?;
      *slot = as_number(value)
        .ok_or_else(|| CoordinateIssue::Malformed(format!("坐标字段非数值: {}", value)))?;
    }
    Ok(RawCoordinates::Named(out))
  }

  fn meta_width_value(&self) -> Option<&Value> {
    present(&self.meta_w)
      .or_else(|| present(&self.image_width))
      .or_else(|| present(&self.meta_width))
  }

  fn meta_height_value(&self) -> Option<&Value> {
    present(&self.meta_h)
      .or_else(|| present(&self.image_height))
      .or_else(|| present(&self.meta_height))
  }

  /// 检测所在坐标空间的宽高（未经数值转换）。
  pub fn meta_values(&self) -> Option<(&Value, &Value)> {
    Some((self.meta_width_value()?, self.meta_height_value()?))
  }

  /// 标签文本，取第一个存在且非空的别名字段。
  pub fn label_text(&self) -> String {
    [
      &self.base_label_yolo,
      &self.nombre,
      &self.label,
      &self.nombre_indicador,
    ]
    .into_iter()
    .filter_map(present)
    .filter_map(|v| match v {
      Value::String(s) => Some(s.trim().to_string()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    })
    .find(|s| !s.is_empty())
    .unwrap_or_default()
  }

  /// 置信度，取第一个可解析为数值的别名字段。
  pub fn confidence_value(&self) -> Option<f64> {
    [&self.confidence_base, &self.confianza, &self.confidence]
      .into_iter()
      .filter_map(present)
      .find_map(as_number)
  }

  /// 关联的指标 ID，忽略非整数元素。
  pub fn indicator_ids(&self) -> Vec<i64> {
    present(&self.indicator_ids)
      .and_then(Value::as_array)
      .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
      .unwrap_or_default()
  }
}

/// 单条指标提取记录，见 `<stem>_indicators.json`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorExtract {
  pub indicator_ids: Vec<i64>,
  pub base_label_yolo: Option<String>,
  pub confidence_base: Option<f64>,
  pub bbox_original: Option<Vec<f64>>,
  pub crop_filename: Option<String>,
}

impl IndicatorExtract {
  /// 没有关联指标的检测返回 `None`。
  pub fn from_detection(detection: &Detection) -> Option<Self> {
    let indicator_ids = detection.indicator_ids();
    if indicator_ids.is_empty() {
      return None;
    }

    let bbox_original = present(&detection.bbox_original)
      .or_else(|| present(&detection.bbox))
      .and_then(Value::as_array)
      .and_then(|items| items.iter().map(as_number).collect::<Option<Vec<_>>>());

    Some(IndicatorExtract {
      indicator_ids,
      base_label_yolo: present(&detection.base_label_yolo)
        .and_then(Value::as_str)
        .map(str::to_string),
      confidence_base: present(&detection.confidence_base).and_then(as_number),
      bbox_original,
      crop_filename: present(&detection.crop_filename)
        .and_then(Value::as_str)
        .map(str::to_string),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn detection(value: Value) -> Detection {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn bbox_wins_over_bbox_original() {
    let det = detection(json!({
      "bbox": [1, 2, 3, 4],
      "bbox_original": [10, 20, 30, 40],
    }));
    assert_eq!(
      det.raw_coordinates(),
      Ok(RawCoordinates::Array([1.0, 2.0, 3.0, 4.0]))
    );
  }

  #[test]
  fn numeric_strings_are_accepted() {
    let det = detection(json!({ "bbox": ["10.5", 20, " 30 ", 40.0] }));
    assert_eq!(
      det.raw_coordinates(),
      Ok(RawCoordinates::Array([10.5, 20.0, 30.0, 40.0]))
    );
  }

  #[test]
  fn malformed_bbox_is_reported() {
    let det = detection(json!({ "bbox": [1, "abc", 3, 4] }));
    assert!(matches!(
      det.raw_coordinates(),
      Err(CoordinateIssue::Malformed(_))
    ));

    let det = detection(json!({ "bbox": [1, 2, 3] }));
    assert!(matches!(
      det.raw_coordinates(),
      Err(CoordinateIssue::Malformed(_))
    ));
  }

  #[test]
  fn named_fields_are_the_fallback() {
    let det = detection(json!({ "x_min": 5, "y_min": 6, "x_max": 50, "y_max": 60 }));
    assert_eq!(
      det.raw_coordinates(),
      Ok(RawCoordinates::Named([5.0, 6.0, 50.0, 60.0]))
    );

    let det = detection(json!({ "x_min": 5, "y_min": 6 }));
    assert_eq!(det.raw_coordinates(), Err(CoordinateIssue::Missing));

    let det = detection(json!({ "nombre": "nube" }));
    assert_eq!(det.raw_coordinates(), Err(CoordinateIssue::Missing));
  }

  #[test]
  fn meta_aliases_follow_priority() {
    let det = detection(json!({ "image_width": 640, "meta_h": 480, "meta_height": 1 }));
    let (w, h) = det.meta_values().unwrap();
    assert_eq!(as_number(w), Some(640.0));
    assert_eq!(as_number(h), Some(480.0));

    let det = detection(json!({ "meta_w": 640 }));
    assert!(det.meta_values().is_none());
  }

  #[test]
  fn label_first_present_wins() {
    let det = detection(json!({ "nombre": "Paraguas", "label": "umbrella" }));
    assert_eq!(det.label_text(), "Paraguas");

    let det = detection(json!({ "base_label_yolo": "", "nombre_indicador": "Nube" }));
    assert_eq!(det.label_text(), "Nube");

    assert_eq!(Detection::default().label_text(), "");
  }

  #[test]
  fn confidence_aliases() {
    let det = detection(json!({ "confianza": "0.5", "confidence": 0.9 }));
    assert_eq!(det.confidence_value(), Some(0.5));
    let det = detection(json!({ "confidence_base": "n/a", "confidence": 0.9 }));
    assert_eq!(det.confidence_value(), Some(0.9));
  }

  #[test]
  fn indicator_extract_requires_ids() {
    let det = detection(json!({ "indicator_ids": [], "bbox": [1, 2, 3, 4] }));
    assert!(IndicatorExtract::from_detection(&det).is_none());

    let det = detection(json!({
      "indicator_ids": [3, "x", 7],
      "base_label_yolo": "lluvia",
      "confidence_base": 0.42,
      "bbox": [1, 2, 3, 4],
      "crop_filename": "crop_0.png",
    }));
    let extract = IndicatorExtract::from_detection(&det).unwrap();
    assert_eq!(extract.indicator_ids, vec![3, 7]);
    assert_eq!(extract.base_label_yolo.as_deref(), Some("lluvia"));
    assert_eq!(extract.confidence_base, Some(0.42));
    assert_eq!(extract.bbox_original, Some(vec![1.0, 2.0, 3.0, 4.0]));
    assert_eq!(extract.crop_filename.as_deref(), Some("crop_0.png"));
  }
}
