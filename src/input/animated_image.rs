// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/animated_image.rs - GIF 动画输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frame};
use thiserror::Error;
use tracing::info;

use crate::{
  frame::VideoFrame,
  input::{InputError, VideoInput},
};

#[derive(Error, Debug)]
pub enum AnimatedImageInputError {
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image decoding error: {0}")]
  ImageError(#[from] image::ImageError),
}

/// GIF 动画输入
///
/// GIF 没有总帧数元数据，打开时先完整解码一遍以得到帧数，
/// 帧率取第一帧的显示时长。
pub struct AnimatedImageInput {
  frames: std::vec::IntoIter<Frame>,
  fps: f64,
  frame_count: u64,
  frame_index: u64,
  timestamp_ms: u64,
}

impl AnimatedImageInput {
  pub fn open(path: &Path) -> Result<Self, AnimatedImageInputError> {
    let reader = BufReader::new(File::open(path)?);
    let decoder = GifDecoder::new(reader)?;
    let frames = decoder.into_frames().collect_frames()?;

    let fps = frames
      .first()
      .map(|frame| {
        let (numer, denom) = frame.delay().numer_denom_ms();
        if numer == 0 || denom == 0 {
          0.0
        } else {
          1000.0 * denom as f64 / numer as f64
        }
      })
      .unwrap_or(0.0);
    let frame_count = frames.len() as u64;

    info!(
      "GIF 动画已打开: {} 帧, 帧率 {:.2}",
      frame_count, fps
    );

    Ok(Self {
      frames: frames.into_iter(),
      fps,
      frame_count,
      frame_index: 0,
      timestamp_ms: 0,
    })
  }
}

impl Iterator for AnimatedImageInput {
  type Item = Result<VideoFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let frame = self.frames.next()?;
    let (numer, denom) = frame.delay().numer_denom_ms();
    let image = DynamicImage::ImageRgba8(frame.into_buffer()).into_rgb8();

    let video_frame = VideoFrame::new(image, self.frame_index, self.timestamp_ms);
    self.frame_index += 1;
    if denom > 0 {
      self.timestamp_ms += (numer / denom) as u64;
    }

    Some(Ok(video_frame))
  }
}

impl VideoInput for AnimatedImageInput {
  fn fps(&self) -> f64 {
    self.fps
  }

  fn frame_count(&self) -> u64 {
    self.frame_count
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::codecs::gif::{GifEncoder, Repeat};
  use image::{Delay, Rgba, RgbaImage};

  fn write_gif(path: &Path, frames: usize, delay_ms: u32) {
    let file = File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    for i in 0..frames {
      let image = RgbaImage::from_pixel(8, 6, Rgba([(i * 20) as u8, 0, 0, 255]));
      encoder
        .encode_frame(Frame::from_parts(
          image,
          0,
          0,
          Delay::from_numer_denom_ms(delay_ms, 1),
        ))
        .unwrap();
    }
  }

  #[test]
  fn reads_frames_and_rate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.gif");
    write_gif(&path, 5, 100);

    let input = AnimatedImageInput::open(&path).unwrap();
    assert_eq!(input.frame_count(), 5);
    assert!((input.fps() - 10.0).abs() < 1e-6);
    assert!((input.estimated_duration_secs() - 0.5).abs() < 1e-6);

    let frames: Vec<VideoFrame> = input.map(|f| f.unwrap()).collect();
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[0].width(), 8);
    assert_eq!(frames[0].height(), 6);
    assert_eq!(frames[4].index, 4);
    assert_eq!(frames[4].timestamp_ms, 400);
  }

  #[test]
  fn garbage_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.gif");
    std::fs::write(&path, b"GIF89a this is not a gif").unwrap();
    assert!(AnimatedImageInput::open(&path).is_err());
  }
}
