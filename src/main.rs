// 该文件是 Lluvia （雨中人） 项目的一部分。
// src/main.rs - 批量提取指标并绘制检测框
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use lluvia::output::Draw;
use lluvia::pipeline::{BatchPipeline, PipelineError};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let output_dir = args.output_dir();

  info!("元数据清单: {}", args.metadata.display());
  info!("输出目录: {}", output_dir.display());

  let draw = Draw::new(&args.draw_config());
  let pipeline = BatchPipeline::new(draw);

  match pipeline.process(&args.metadata, &output_dir) {
    Ok(summaries) => {
      let drawn = summaries.iter().filter(|s| s.bboxes_drawn).count();
      let indicators: usize = summaries.iter().map(|s| s.indicators_saved).sum();
      info!(
        "共 {} 张图像, 已绘制 {} 张, 保存指标 {} 条",
        summaries.len(),
        drawn,
        indicators
      );
      Ok(())
    }
    Err(PipelineError::ManifestNotFound(path)) => {
      error!("元数据文件不存在: {}", path.display());
      Ok(())
    }
    Err(e) => Err(e.into()),
  }
}
