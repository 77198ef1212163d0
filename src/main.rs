// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 检测服务主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use shanan_serve::{
  FromUrl,
  model::{Detector, YoloV8Builder},
  output::Draw,
  server::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型地址: {}", args.model);
  info!("监听地址: {}", args.bind);
  info!("视频时长上限: {}s", args.max_video_secs);

  info!("正在加载模型...");
  let now = std::time::Instant::now();
  let model = YoloV8Builder::from_url(&args.model)?.build()?;
  info!(
    "模型加载完成，{} 个类别，耗时: {:.2?}",
    model.class_names().len(),
    now.elapsed()
  );
  let detector: Arc<dyn Detector> = Arc::new(model);

  let draw = match &args.font {
    Some(path) => {
      Draw::from_font_file(path).with_context(|| format!("无法加载字体: {}", path.display()))?
    }
    None => Draw::new()?,
  };

  let state = AppState::new(detector, draw, args.service_config());
  server::serve(args.bind, state).await?;

  info!("服务已退出");
  Ok(())
}
