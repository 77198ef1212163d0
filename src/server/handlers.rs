// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server/handlers.rs - 路由处理函数
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

use axum::{Json, extract::State};
use axum_extra::extract::Multipart;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState, upload::read_upload};
use crate::pipeline::{annotate_image, annotate_video};

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
  pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotatedImage {
  pub annotated_image: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotatedVideo {
  pub annotated_video: String,
}

/// GET /
pub async fn root() -> Json<StatusMessage> {
  Json(StatusMessage {
    message: "API Running".to_string(),
  })
}

/// POST /detect-image（以及旧路径 /detect）
pub async fn detect_image(
  State(state): State<AppState>,
  multipart: Multipart,
) -> Result<Json<AnnotatedImage>, ApiError> {
  let upload = read_upload(multipart).await?;
  info!("图像检测请求: {} 字节", upload.bytes.len());

  let quality = state.config.jpeg_quality;
  let annotated_image = tokio::task::spawn_blocking(move || {
    annotate_image(
      state.detector.as_ref(),
      &state.draw,
      &upload.bytes,
      quality,
    )
  })
  .await??;

  Ok(Json(AnnotatedImage { annotated_image }))
}

/// POST /detect-video
pub async fn detect_video(
  State(state): State<AppState>,
  multipart: Multipart,
) -> Result<Json<AnnotatedVideo>, ApiError> {
  let upload = read_upload(multipart).await?;
  info!(
    "视频检测请求: {:?}, {} 字节",
    upload.file_name.as_deref().unwrap_or("<unnamed>"),
    upload.bytes.len()
  );

  let options = state.config.video_options();
  let annotated_video = tokio::task::spawn_blocking(move || {
    annotate_video(
      state.detector.as_ref(),
      &state.draw,
      &upload.bytes,
      upload.file_name.as_deref(),
      &options,
    )
  })
  .await??;

  Ok(Json(AnnotatedVideo { annotated_video }))
}
