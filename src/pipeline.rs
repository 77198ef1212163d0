// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 图像与视频标注流程
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

//! 两条同步流程，供 HTTP 层在阻塞线程池中调用。
//!
//! 视频流程会把上传内容写入临时文件，无论成功与否，返回前都会删除该文件。

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{
  input::{decode_image, open_video},
  model::Detector,
  output::{DEFAULT_GIF_SPEED, Draw, GifOutput, JpegOutput},
  task::{ContinuousTask, OneShotTask, Task, TaskError},
};

pub const DEFAULT_MAX_VIDEO_SECS: f64 = 10.0;

const DEFAULT_UPLOAD_SUFFIX: &str = ".mp4";
const MAX_SUFFIX_LEN: usize = 8;
const TEMP_FILE_PREFIX: &str = "shanan-upload-";

#[derive(Debug, Clone)]
pub struct VideoOptions {
  pub max_duration_secs: f64,
  pub gif_speed: i32,
  /// 临时文件目录，`None` 时使用系统临时目录
  pub temp_dir: Option<PathBuf>,
}

impl Default for VideoOptions {
  fn default() -> Self {
    Self {
      max_duration_secs: DEFAULT_MAX_VIDEO_SECS,
      gif_speed: DEFAULT_GIF_SPEED,
      temp_dir: None,
    }
  }
}

/// 图像流程：解码、推理、绘制、JPEG 编码，返回 data URI
pub fn annotate_image<D: Detector + ?Sized>(
  detector: &D,
  draw: &Draw,
  bytes: &[u8],
  jpeg_quality: u8,
) -> Result<String, TaskError> {
  let image = decode_image(bytes)?;
  let output = JpegOutput::new(draw.clone(), jpeg_quality);
  let media = OneShotTask.run_task(image, detector, output)?;
  Ok(media.to_data_uri())
}

/// 视频流程：落盘、打开、校验时长、逐帧标注、GIF 编码，返回 data URI
pub fn annotate_video<D: Detector + ?Sized>(
  detector: &D,
  draw: &Draw,
  bytes: &[u8],
  file_name: Option<&str>,
  options: &VideoOptions,
) -> Result<String, TaskError> {
  let suffix = upload_suffix(file_name);
  let mut builder = tempfile::Builder::new();
  builder.prefix(TEMP_FILE_PREFIX).suffix(&suffix);
  let mut tmp = match &options.temp_dir {
    Some(dir) => builder.tempfile_in(dir),
    None => builder.tempfile(),
  }
  .map_err(TaskError::TempFile)?;
  debug!("上传内容写入临时文件: {}", tmp.path().display());

  let result = persist_upload(&mut tmp, bytes)
    .and_then(|_| annotate_video_file(detector, draw, tmp.path(), options));

  let path = tmp.path().to_path_buf();
  if let Err(e) = tmp.close() {
    warn!("删除临时文件失败 {}: {}", path.display(), e);
  }

  result
}

fn persist_upload(tmp: &mut NamedTempFile, bytes: &[u8]) -> Result<(), TaskError> {
  tmp.write_all(bytes).map_err(TaskError::TempFile)?;
  tmp.flush().map_err(TaskError::TempFile)
}

fn annotate_video_file<D: Detector + ?Sized>(
  detector: &D,
  draw: &Draw,
  path: &Path,
  options: &VideoOptions,
) -> Result<String, TaskError> {
  let input = open_video(path).map_err(|e| {
    warn!("无法打开视频 {}: {}", path.display(), e);
    TaskError::OpenVideo(e)
  })?;
  let output = GifOutput::new(draw.clone(), input.fps(), options.gif_speed);
  let media = ContinuousTask::new(options.max_duration_secs).run_task(input, detector, output)?;
  info!("视频标注完成: GIF {} 字节", media.bytes.len());
  Ok(media.to_data_uri())
}

/// 由上传文件名推断临时文件后缀，异常时退回 `.mp4`
pub fn upload_suffix(file_name: Option<&str>) -> String {
  file_name
    .and_then(|name| Path::new(name).extension())
    .and_then(|ext| ext.to_str())
    .filter(|ext| {
      !ext.is_empty() && ext.len() <= MAX_SUFFIX_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
    })
    .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
    .unwrap_or_else(|| DEFAULT_UPLOAD_SUFFIX.to_string())
}
