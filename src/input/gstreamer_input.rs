// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频文件输入
//!
//! 通过 `filesrc ! decodebin ! videoconvert ! appsink` 管道解码上传的视频文件，
//! 支持 GStreamer 插件能识别的所有容器（mp4、webm、mkv、avi 等）。
//! appsink 接受 RGB 或 BGR 排列，BGR 帧在转换时交换通道。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev \
//!   gstreamer1.0-plugins-good gstreamer1.0-libav
//! ```
//!
//! ## 元数据
//!
//! 打开时管道先进入 PAUSED 状态完成预滚，此时可以查询时长与帧率。
//! 总帧数由 `时长 × 帧率` 估算，二者任一缺失时为 0。

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  frame::{VideoFrame, rgb_image_from_strided},
  input::{InputError, VideoInput},
};

const PREROLL_TIMEOUT_SECS: u64 = 10;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取命名元素
  #[error("Failed to get element: {0}")]
  ElementNotFound(&'static str),
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: {width}x{height} stride {stride}, got {actual} bytes")]
  BufferSizeMismatch {
    width: u32,
    height: u32,
    stride: usize,
    actual: usize,
  },
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 路径无法转换为 UTF-8
  #[error("Path is not valid UTF-8")]
  InvalidPath,
}

/// GStreamer 视频文件输入
///
/// 管道在 drop 时切回 NULL 状态并释放文件句柄。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  fps: f64,
  frame_count: u64,
  frame_index: u64,
  finished: bool,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  pub fn open(path: &Path) -> Result<Self, GStreamerInputError> {
    gst::init()?;

    let location = path.to_str().ok_or(GStreamerInputError::InvalidPath)?;
    let description = "filesrc name=src ! decodebin ! videoconvert ! video/x-raw,format={RGB,BGR} ! appsink name=sink sync=false";
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    pipeline
      .by_name("src")
      .ok_or(GStreamerInputError::ElementNotFound("src"))?
      .set_property("location", location);

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::ElementNotFound("sink"))?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    let mut input = GStreamerInput {
      pipeline,
      appsink,
      fps: 0.0,
      frame_count: 0,
      frame_index: 0,
      finished: false,
    };

    // 预滚：文件无法解析时在这里失败
    input.pipeline.set_state(gst::State::Paused)?;
    let (result, _, _) = input
      .pipeline
      .state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
    if let Err(e) = result {
      let detail = input.bus_error().unwrap_or_else(|| e.to_string());
      error!("视频预滚失败: {}", detail);
      return Err(GStreamerInputError::PipelineError(detail));
    }

    input.fps = input.negotiated_fps().unwrap_or(0.0);
    let duration_secs = input
      .pipeline
      .query_duration::<gst::ClockTime>()
      .map(|d| d.nseconds() as f64 / 1_000_000_000.0)
      .unwrap_or(0.0);
    input.frame_count = (duration_secs * input.fps).round().max(0.0) as u64;

    info!(
      "视频已打开: 时长 {:.2}s, 帧率 {:.2}, 估计帧数 {}",
      duration_secs, input.fps, input.frame_count
    );

    input.pipeline.set_state(gst::State::Playing)?;
    Ok(input)
  }

  fn negotiated_fps(&self) -> Option<f64> {
    let caps = self.appsink.static_pad("sink")?.current_caps()?;
    let info = gst_video::VideoInfo::from_caps(&caps).ok()?;
    let fps = info.fps();
    if fps.denom() == 0 {
      return None;
    }
    Some(fps.numer() as f64 / fps.denom() as f64)
  }

  fn bus_error(&self) -> Option<String> {
    let bus = self.pipeline.bus()?;
    let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
    match msg.view() {
      gst::MessageView::Error(err) => Some(err.error().to_string()),
      _ => None,
    }
  }

  fn convert_sample(sample: &gst::Sample, index: u64) -> Result<VideoFrame, GStreamerInputError> {
    let buffer = sample
      .buffer()
      .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
    let caps = sample
      .caps()
      .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

    let video_info =
      gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

    let bgr = match video_info.format() {
      gst_video::VideoFormat::Rgb => false,
      gst_video::VideoFormat::Bgr => true,
      _ => return Err(GStreamerInputError::UnsupportedFormat),
    };

    let width = video_info.width();
    let height = video_info.height();
    let stride = video_info.stride()[0] as usize;

    let map = buffer.map_readable().map_err(|e| {
      GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
    })?;
    let data = map.as_slice();

    let image = rgb_image_from_strided(data, width, height, stride, bgr).ok_or(
      GStreamerInputError::BufferSizeMismatch {
        width,
        height,
        stride,
        actual: data.len(),
      },
    )?;

    let timestamp_ms = buffer.pts().map(|pts| pts.mseconds()).unwrap_or(0);
    Ok(VideoFrame::new(image, index, timestamp_ms))
  }
}

impl Iterator for GStreamerInput {
  type Item = Result<VideoFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }

    match self.appsink.pull_sample() {
      Ok(sample) => {
        let frame = Self::convert_sample(&sample, self.frame_index);
        self.frame_index += 1;
        Some(frame.map_err(InputError::from))
      }
      Err(_) => {
        self.finished = true;
        if self.appsink.is_eos() {
          debug!("视频读取结束，共 {} 帧", self.frame_index);
          return None;
        }
        let detail = self
          .bus_error()
          .unwrap_or_else(|| "Failed to pull sample".to_string());
        error!("Failed to pull sample: {}", detail);
        Some(Err(GStreamerInputError::PipelineError(detail).into()))
      }
    }
  }
}

impl VideoInput for GStreamerInput {
  fn fps(&self) -> f64 {
    self.fps
  }

  fn frame_count(&self) -> u64 {
    self.frame_count
  }
}
