// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_bytes.rs - 内存图像输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::io::Cursor;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ImageBytesInputError {
  #[error("Image data is empty")]
  EmptyData,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 从上传的字节解码出 RGB 图像，格式由内容猜测
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, ImageBytesInputError> {
  if bytes.is_empty() {
    error!("图像数据为空");
    return Err(ImageBytesInputError::EmptyData);
  }

  let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
  debug!("图像格式: {:?}", reader.format());
  let image = reader.decode()?;

  Ok(image.into_rgb8())
}
