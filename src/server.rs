// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server.rs - HTTP 服务
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

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
  model::Detector,
  output::{DEFAULT_GIF_SPEED, DEFAULT_JPEG_QUALITY, Draw},
  pipeline::{DEFAULT_MAX_VIDEO_SECS, VideoOptions},
};

mod error;
mod handlers;
mod upload;

pub use self::error::ApiError;
pub use self::handlers::{AnnotatedImage, AnnotatedVideo, StatusMessage};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// 服务运行参数
#[derive(Debug, Clone)]
pub struct ServiceConfig {
  pub max_video_secs: f64,
  pub jpeg_quality: u8,
  pub gif_speed: i32,
  pub max_upload_bytes: usize,
  pub temp_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      max_video_secs: DEFAULT_MAX_VIDEO_SECS,
      jpeg_quality: DEFAULT_JPEG_QUALITY,
      gif_speed: DEFAULT_GIF_SPEED,
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
      temp_dir: None,
    }
  }
}

impl ServiceConfig {
  pub fn video_options(&self) -> VideoOptions {
    VideoOptions {
      max_duration_secs: self.max_video_secs,
      gif_speed: self.gif_speed,
      temp_dir: self.temp_dir.clone(),
    }
  }
}

/// 请求间共享的只读状态
#[derive(Clone)]
pub struct AppState {
  pub detector: Arc<dyn Detector>,
  pub draw: Draw,
  pub config: Arc<ServiceConfig>,
}

impl AppState {
  pub fn new(detector: Arc<dyn Detector>, draw: Draw, config: ServiceConfig) -> Self {
    Self {
      detector,
      draw,
      config: Arc::new(config),
    }
  }
}

pub fn router(state: AppState) -> Router {
  let body_limit = state.config.max_upload_bytes;

  Router::new()
    .route("/", get(handlers::root))
    .route("/detect", post(handlers::detect_image))
    .route("/detect-image", post(handlers::detect_image))
    .route("/detect-video", post(handlers::detect_video))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(CorsLayer::very_permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// 绑定地址并运行服务，收到 Ctrl-C 后优雅退出
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("服务监听于 http://{}", listener.local_addr()?);

  axum::serve(listener, router(state))
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
  match tokio::signal::ctrl_c().await {
    Ok(()) => info!("收到中断信号，准备退出..."),
    Err(e) => warn!("无法监听中断信号: {}", e),
  }
}
