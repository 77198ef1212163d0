// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/jpeg_output.rs - JPEG 图片输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use super::{Draw, EncodedMedia, OutputError, OutputWriter};
use crate::model::DetectResult;

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// 单帧 JPEG 输出
pub struct JpegOutput {
  draw: Draw,
  quality: u8,
  image: Option<RgbImage>,
}

impl JpegOutput {
  pub fn new(draw: Draw, quality: u8) -> Self {
    Self {
      draw,
      quality: quality.clamp(1, 100),
      image: None,
    }
  }
}

impl OutputWriter for JpegOutput {
  fn write_frame(&mut self, mut image: RgbImage, result: &DetectResult) -> Result<(), OutputError> {
    if self.image.is_some() {
      return Err(OutputError::AlreadyWritten);
    }
    self.draw.draw_detections(&mut image, result);
    self.image = Some(image);
    Ok(())
  }

  fn frames_written(&self) -> usize {
    usize::from(self.image.is_some())
  }

  fn finish(self) -> Result<EncodedMedia, OutputError> {
    let image = self.image.ok_or(OutputError::NoFrames)?;

    let mut bytes = Vec::new();
    image.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, self.quality))?;
    debug!(
      "JPEG 编码完成: {}x{}, {} 字节",
      image.width(),
      image.height(),
      bytes.len()
    );

    Ok(EncodedMedia {
      mime: "image/jpeg",
      bytes,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageFormat, Rgb};

  #[test]
  fn encodes_single_frame() {
    let mut output = JpegOutput::new(Draw::new().unwrap(), DEFAULT_JPEG_QUALITY);
    output
      .write_frame(RgbImage::from_pixel(33, 17, Rgb([200, 10, 10])), &DetectResult::default())
      .unwrap();
    assert_eq!(output.frames_written(), 1);

    let media = output.finish().unwrap();
    assert_eq!(media.mime, "image/jpeg");
    assert_eq!(image::guess_format(&media.bytes).unwrap(), ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&media.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (33, 17));
  }

  #[test]
  fn rejects_second_frame() {
    let mut output = JpegOutput::new(Draw::new().unwrap(), 80);
    output
      .write_frame(RgbImage::new(4, 4), &DetectResult::default())
      .unwrap();
    assert!(matches!(
      output.write_frame(RgbImage::new(4, 4), &DetectResult::default()),
      Err(OutputError::AlreadyWritten)
    ));
  }

  #[test]
  fn finish_without_frame_fails() {
    let output = JpegOutput::new(Draw::new().unwrap(), 80);
    assert!(matches!(output.finish(), Err(OutputError::NoFrames)));
  }
}
