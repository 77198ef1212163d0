// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 视频帧定义
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

const RGB_CHANNELS: usize = 3;

/// 解码后的一帧
#[derive(Debug, Clone)]
pub struct VideoFrame {
  /// RGB 图像数据，标注时原地修改
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl VideoFrame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 从打包的 RGB 行数据构建图像，跳过每行末尾的对齐字节
pub fn rgb_image_from_strided(
  data: &[u8],
  width: u32,
  height: u32,
  stride: usize,
  bgr: bool,
) -> Option<RgbImage> {
  let row_bytes = width as usize * RGB_CHANNELS;
  if stride < row_bytes || data.len() < stride * (height as usize).saturating_sub(1) + row_bytes {
    return None;
  }

  let mut packed = Vec::with_capacity(row_bytes * height as usize);
  for y in 0..height as usize {
    let row = &data[y * stride..y * stride + row_bytes];
    if bgr {
      for px in row.chunks_exact(RGB_CHANNELS) {
        packed.extend_from_slice(&[px[2], px[1], px[0]]);
      }
    } else {
      packed.extend_from_slice(row);
    }
  }

  RgbImage::from_raw(width, height, packed)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strided_rows_are_packed() {
    // 2x2 图像，每行 8 字节（6 字节像素 + 2 字节填充）
    let data = [
      1, 2, 3, 4, 5, 6, 0, 0, //
      7, 8, 9, 10, 11, 12, 0, 0,
    ];
    let image = rgb_image_from_strided(&data, 2, 2, 8, false).unwrap();
    assert_eq!(image.get_pixel(1, 0).0, [4, 5, 6]);
    assert_eq!(image.get_pixel(0, 1).0, [7, 8, 9]);
  }

  #[test]
  fn bgr_rows_are_swapped() {
    let data = [30, 20, 10];
    let image = rgb_image_from_strided(&data, 1, 1, 3, true).unwrap();
    assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30]);
  }

  #[test]
  fn short_buffer_is_rejected() {
    assert!(rgb_image_from_strided(&[0; 5], 2, 1, 6, false).is_none());
  }
}
