// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::info;

use crate::model::{DetectResult, Detection};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 24.0;
const LABEL_BASELINE_OFFSET: i32 = 10; // 标签底边距离框顶的像素
const BOX_THICKNESS: i32 = 3;
const BOX_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法读取字体文件: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法加载字体: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 绘制上下文，字体加载一次后在请求间共享
#[derive(Clone)]
pub struct Draw {
  font: FontArc,
  scale: PxScale,
  color: Rgb<u8>,
  thickness: i32,
}

impl Draw {
  /// 使用内置的 DejaVu Sans 字体
  pub fn new() -> Result<Self, DrawError> {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;
    Ok(Self::with_font(font))
  }

  /// 从 TTF/OTF 文件加载字体
  pub fn from_font_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    info!("已加载字体: {}", path.display());
    Ok(Self::with_font(font))
  }

  fn with_font(font: FontArc) -> Self {
    Self {
      font,
      scale: PxScale::from(LABEL_FONT_SIZE),
      color: Rgb(BOX_COLOR),
      thickness: BOX_THICKNESS,
    }
  }

  /// 在图像上绘制全部检测框与标签
  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    for detection in result.items.iter() {
      self.draw_detection(image, detection);
    }
  }

  fn draw_detection(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let [x1, y1, x2, y2] = detection.bbox;
    let x1 = x1.clamp(0, w - 1);
    let y1 = y1.clamp(0, h - 1);
    let x2 = x2.clamp(0, w - 1);
    let y2 = y2.clamp(0, h - 1);
    if x1 >= x2 || y1 >= y2 {
      return;
    }

    // 向内逐层描边
    for t in 0..self.thickness {
      let width = x2 - x1 + 1 - 2 * t;
      let height = y2 - y1 + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x1 + t, y1 + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, self.color);
    }

    let label = detection.label();
    let (_, text_height) = text_size(self.scale, &self.font, &label);
    let label_y = (y1 - LABEL_BASELINE_OFFSET - text_height as i32).max(0);

    draw_text_mut(
      image,
      self.color,
      x1,
      label_y,
      self.scale,
      &self.font,
      &label,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(bbox: [i32; 4]) -> Detection {
    Detection {
      bbox,
      confidence: 0.88,
      class_id: 0,
      class_name: "person".to_string(),
    }
  }

  fn is_green(pixel: &Rgb<u8>) -> bool {
    pixel.0 == BOX_COLOR
  }

  #[test]
  fn draws_three_pixel_box() {
    let draw = Draw::new().unwrap();
    let mut image = RgbImage::new(100, 100);
    draw.draw_detections(&mut image, &vec![detection([20, 40, 80, 90])].into());

    for x in 20..23 {
      assert!(is_green(image.get_pixel(x, 60)), "left edge at x={x}");
    }
    for x in 78..81 {
      assert!(is_green(image.get_pixel(x, 60)), "right edge at x={x}");
    }
    assert!(is_green(image.get_pixel(50, 40)));
    assert!(is_green(image.get_pixel(50, 90)));
    assert_eq!(image.get_pixel(50, 65).0, [0, 0, 0]);
    assert_eq!(image.get_pixel(23, 60).0, [0, 0, 0]);
  }

  #[test]
  fn label_sits_above_box() {
    let draw = Draw::new().unwrap();
    let mut image = RgbImage::new(200, 120);
    draw.draw_detections(&mut image, &vec![detection([10, 60, 150, 110])].into());

    let mut label_pixels = 0;
    for y in 0..50 {
      for x in 0..200 {
        if image.get_pixel(x, y)[1] > 0 {
          label_pixels += 1;
        }
      }
    }
    assert!(label_pixels > 0);
  }

  #[test]
  fn out_of_bounds_box_is_clamped() {
    let draw = Draw::new().unwrap();
    let mut image = RgbImage::new(50, 50);
    draw.draw_detections(&mut image, &vec![detection([-5, -5, 200, 200])].into());

    assert!(is_green(image.get_pixel(0, 25)));
    assert!(is_green(image.get_pixel(49, 25)));
    assert!(is_green(image.get_pixel(25, 49)));
  }

  #[test]
  fn degenerate_box_is_skipped() {
    let draw = Draw::new().unwrap();
    let mut image = RgbImage::new(30, 30);
    draw.draw_detections(&mut image, &vec![detection([10, 10, 10, 20])].into());
    assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
  }

  #[test]
  fn missing_font_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      Draw::from_font_file(&dir.path().join("nope.ttf")),
      Err(DrawError::IoError(_))
    ));
  }
}
