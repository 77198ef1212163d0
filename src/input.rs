// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::frame::VideoFrame;

mod animated_image;
mod read_image_bytes;

pub use self::animated_image::{AnimatedImageInput, AnimatedImageInputError};
pub use self::read_image_bytes::{ImageBytesInputError, decode_image};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Animated image input error: {0}")]
  AnimatedImageInputError(#[from] AnimatedImageInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Input file is empty")]
  EmptyFile,
  #[error("No decoder available for this input")]
  Unsupported,
}

/// 逐帧读取的视频输入。
///
/// `fps` 与 `frame_count` 来自容器元数据，可能为 0 或不准确。
pub trait VideoInput: Iterator<Item = Result<VideoFrame, InputError>> {
  /// 帧率，未知时为 0
  fn fps(&self) -> f64;

  /// 总帧数，未知时为 0
  fn frame_count(&self) -> u64;

  /// 估算时长（秒），帧率无效时为 0
  fn estimated_duration_secs(&self) -> f64 {
    estimate_duration_secs(self.frame_count(), self.fps())
  }
}

impl<T: VideoInput + ?Sized> VideoInput for Box<T> {
  fn fps(&self) -> f64 {
    (**self).fps()
  }

  fn frame_count(&self) -> u64 {
    (**self).frame_count()
  }
}

pub fn estimate_duration_secs(frame_count: u64, fps: f64) -> f64 {
  if fps > 0.0 {
    frame_count as f64 / fps
  } else {
    0.0
  }
}

const GIF_MAGIC: [&[u8]; 2] = [b"GIF87a", b"GIF89a"];

fn is_gif(path: &Path) -> Result<bool, std::io::Error> {
  let mut header = [0u8; 6];
  let mut file = std::fs::File::open(path)?;
  let mut read = 0;
  while read < header.len() {
    let n = file.read(&mut header[read..])?;
    if n == 0 {
      break;
    }
    read += n;
  }
  Ok(read == header.len() && GIF_MAGIC.contains(&&header[..]))
}

/// 打开视频文件
///
/// GIF 由 `image` 解码，其余容器交给 GStreamer（需要 `gstreamer_input` 特性）。
pub fn open_video(path: &Path) -> Result<Box<dyn VideoInput + Send>, InputError> {
  let size = std::fs::metadata(path)?.len();
  if size == 0 {
    warn!("视频文件为空: {}", path.display());
    return Err(InputError::EmptyFile);
  }

  if is_gif(path)? {
    debug!("按 GIF 动画打开: {}", path.display());
    return Ok(Box::new(AnimatedImageInput::open(path)?));
  }

  #[cfg(feature = "gstreamer_input")]
  {
    debug!("按 GStreamer 管道打开: {}", path.display());
    Ok(Box::new(GStreamerInput::open(path)?))
  }

  #[cfg(not(feature = "gstreamer_input"))]
  {
    warn!("未启用 gstreamer_input 特性，无法解码: {}", path.display());
    Err(InputError::Unsupported)
  }
}
