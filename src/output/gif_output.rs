// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/gif_output.rs - GIF 动画输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage, RgbaImage};
use tracing::{debug, info};

use super::{Draw, EncodedMedia, OutputError, OutputWriter};
use crate::model::DetectResult;

/// NeuQuant 采样速度，1 最慢质量最好，30 最快
pub const DEFAULT_GIF_SPEED: i32 = 10;

const FALLBACK_FRAME_DELAY_MS: u32 = 100;

/// GIF 延时单位为百分之一秒
const MIN_FRAME_DELAY_MS: u32 = 10;

/// 每帧显示时长（毫秒），帧率无效时为 100，最短 10
pub fn frame_delay_ms(fps: f64) -> u32 {
  if fps > 0.0 {
    ((1000.0 / fps) as u32).max(MIN_FRAME_DELAY_MS)
  } else {
    FALLBACK_FRAME_DELAY_MS
  }
}

/// GIF 动画输出
///
/// 所有帧先以 RGBA 缓存在内存中，`finish` 时统一量化编码，无限循环播放。
pub struct GifOutput {
  draw: Draw,
  delay_ms: u32,
  speed: i32,
  frames: Vec<RgbaImage>,
}

impl GifOutput {
  pub fn new(draw: Draw, fps: f64, speed: i32) -> Self {
    let delay_ms = frame_delay_ms(fps);
    debug!("GIF 输出: 帧率 {:.2}, 帧间隔 {} ms", fps, delay_ms);
    Self {
      draw,
      delay_ms,
      speed: speed.clamp(1, 30),
      frames: Vec::new(),
    }
  }
}

impl OutputWriter for GifOutput {
  fn write_frame(&mut self, mut image: RgbImage, result: &DetectResult) -> Result<(), OutputError> {
    self.draw.draw_detections(&mut image, result);
    self
      .frames
      .push(DynamicImage::ImageRgb8(image).into_rgba8());
    Ok(())
  }

  fn frames_written(&self) -> usize {
    self.frames.len()
  }

  fn finish(self) -> Result<EncodedMedia, OutputError> {
    if self.frames.is_empty() {
      return Err(OutputError::NoFrames);
    }

    let frame_count = self.frames.len();
    let mut bytes = Vec::new();
    {
      let mut encoder = GifEncoder::new_with_speed(&mut bytes, self.speed);
      encoder.set_repeat(Repeat::Infinite)?;
      for image in self.frames {
        let delay = Delay::from_numer_denom_ms(self.delay_ms, 1);
        encoder.encode_frame(Frame::from_parts(image, 0, 0, delay))?;
      }
    }

    info!("GIF 编码完成: {} 帧, {} 字节", frame_count, bytes.len());

    Ok(EncodedMedia {
      mime: "image/gif",
      bytes,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detection;
  use image::codecs::gif::GifDecoder;
  use image::{AnimationDecoder, Rgb};
  use std::io::Cursor;

  #[test]
  fn delay_follows_frame_rate() {
    assert_eq!(frame_delay_ms(10.0), 100);
    assert_eq!(frame_delay_ms(30.0), 33);
    assert_eq!(frame_delay_ms(0.0), 100);
    assert_eq!(frame_delay_ms(-3.0), 100);
  }

  #[test]
  fn delay_never_drops_below_one_centisecond() {
    assert_eq!(frame_delay_ms(100.0), 10);
    assert_eq!(frame_delay_ms(240.0), 10);
    assert_eq!(frame_delay_ms(2000.0), 10);
  }

  #[test]
  fn encodes_all_frames_with_boxes() {
    let mut output = GifOutput::new(Draw::new().unwrap(), 10.0, DEFAULT_GIF_SPEED);
    let result = DetectResult::from(vec![Detection {
      bbox: [10, 30, 50, 60],
      confidence: 0.9,
      class_id: 2,
      class_name: "car".to_string(),
    }]);
    for _ in 0..4 {
      output
        .write_frame(RgbImage::from_pixel(64, 64, Rgb([0, 0, 0])), &result)
        .unwrap();
    }
    assert_eq!(output.frames_written(), 4);

    let media = output.finish().unwrap();
    assert_eq!(media.mime, "image/gif");

    let decoder = GifDecoder::new(Cursor::new(media.bytes)).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 4);
    for frame in &frames {
      let (numer, denom) = frame.delay().numer_denom_ms();
      assert_eq!(numer / denom, 100);
      let buffer = frame.buffer();
      assert_eq!(buffer.dimensions(), (64, 64));
      let edge = buffer.get_pixel(10, 45);
      assert!(edge[1] > 200 && edge[0] < 60 && edge[2] < 60, "{edge:?}");
    }
  }

  #[test]
  fn finish_without_frames_fails() {
    let output = GifOutput::new(Draw::new().unwrap(), 30.0, DEFAULT_GIF_SPEED);
    assert!(matches!(output.finish(), Err(OutputError::NoFrames)));
  }
}
