// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;
use lluvia::output::DrawConfig;

/// 从元数据清单提取指标并在原图上绘制检测框
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 元数据清单文件路径
  #[arg(short, long, default_value = "metadata1.json", value_name = "FILE")]
  pub metadata: PathBuf,

  /// 输出目录（默认为清单所在目录）
  #[arg(short, long, value_name = "DIR")]
  pub outdir: Option<PathBuf>,

  /// 标签使用的 TrueType 字体（默认查找系统字体）
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 标签字号
  #[arg(long, default_value = "14", value_name = "PX")]
  pub font_size: f32,

  /// 逐框输出调试日志
  #[arg(long)]
  pub debug: bool,
}

impl Args {
  pub fn output_dir(&self) -> PathBuf {
    if let Some(outdir) = &self.outdir {
      return outdir.clone();
    }
    match self.metadata.parent() {
      Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
      _ => PathBuf::from("."),
    }
  }

  pub fn draw_config(&self) -> DrawConfig {
    DrawConfig {
      font_path: self.font.clone(),
      font_size: self.font_size,
      debug: self.debug,
      ..DrawConfig::default()
    }
  }
}
