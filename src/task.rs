// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 任务执行
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  input::{ImageBytesInputError, InputError, VideoInput},
  model::{Detector, ModelError},
  output::{EncodedMedia, OutputError, OutputWriter},
};

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("Could not decode image: {0}")]
  ImageDecode(#[from] ImageBytesInputError),
  #[error("Could not open video file")]
  OpenVideo(#[source] InputError),
  #[error("Could not store upload: {0}")]
  TempFile(#[source] std::io::Error),
  #[error("Video duration exceeds {limit_secs} seconds")]
  DurationExceeded { limit_secs: f64, duration_secs: f64 },
  #[error("No frames processed")]
  NoFrames,
  #[error("Detection failed: {0}")]
  Model(#[from] ModelError),
  #[error("Output failed: {0}")]
  Output(#[from] OutputError),
}

pub trait Task<I, D: Detector + ?Sized, O: OutputWriter>: Sized {
  type Error;
  fn run_task(self, input: I, detector: &D, output: O) -> Result<EncodedMedia, Self::Error>;
}

/// 单帧任务：一次推理，一次输出
pub struct OneShotTask;

impl<D: Detector + ?Sized, O: OutputWriter> Task<RgbImage, D, O> for OneShotTask {
  type Error = TaskError;

  fn run_task(self, image: RgbImage, detector: &D, mut output: O) -> Result<EncodedMedia, TaskError> {
    info!("开始单帧任务: {}x{}", image.width(), image.height());
    let now = std::time::Instant::now();
    let result = detector.detect(&image)?;
    info!("推理完成，检测到 {} 个目标，耗时: {:.2?}", result.len(), now.elapsed());
    output.write_frame(image, &result)?;
    Ok(output.finish()?)
  }
}

/// 连续任务：先校验时长，再逐帧推理直到流结束
#[derive(Debug, Clone, Copy)]
pub struct ContinuousTask {
  max_duration_secs: f64,
}

impl ContinuousTask {
  pub fn new(max_duration_secs: f64) -> Self {
    Self { max_duration_secs }
  }
}

impl<I: VideoInput, D: Detector + ?Sized, O: OutputWriter> Task<I, D, O> for ContinuousTask {
  type Error = TaskError;

  fn run_task(self, input: I, detector: &D, mut output: O) -> Result<EncodedMedia, TaskError> {
    let duration_secs = input.estimated_duration_secs();
    info!(
      "开始连续任务: 帧率 {:.2}, 帧数 {}, 估计时长 {:.2}s",
      input.fps(),
      input.frame_count(),
      duration_secs
    );
    if duration_secs > self.max_duration_secs {
      warn!(
        "视频时长 {:.2}s 超过上限 {}s，拒绝处理",
        duration_secs, self.max_duration_secs
      );
      return Err(TaskError::DurationExceeded {
        limit_secs: self.max_duration_secs,
        duration_secs,
      });
    }

    let started = std::time::Instant::now();
    for frame in input {
      // 解码失败视为流结束
      let frame = match frame {
        Ok(frame) => frame,
        Err(e) => {
          warn!("读取帧失败，停止处理: {}", e);
          break;
        }
      };
      let result = detector.detect(&frame.image)?;
      debug!(
        "第 {} 帧 ({} ms): {} 个目标",
        frame.index,
        frame.timestamp_ms,
        result.len()
      );
      output.write_frame(frame.image, &result)?;
    }

    let processed = output.frames_written();
    if processed == 0 {
      warn!("没有处理任何帧");
      return Err(TaskError::NoFrames);
    }
    info!("共处理 {} 帧，耗时: {:.2?}", processed, started.elapsed());

    Ok(output.finish()?)
  }
}
