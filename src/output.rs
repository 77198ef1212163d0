// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use thiserror::Error;

use crate::model::DetectResult;

pub mod draw;

mod data_uri;
mod gif_output;
mod jpeg_output;

pub use self::data_uri::data_uri;
pub use self::draw::{Draw, DrawError};
pub use self::gif_output::{DEFAULT_GIF_SPEED, GifOutput, frame_delay_ms};
pub use self::jpeg_output::{DEFAULT_JPEG_QUALITY, JpegOutput};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("图像编码错误: {0}")]
  EncodeError(#[from] image::ImageError),
  #[error("没有可输出的帧")]
  NoFrames,
  #[error("单帧输出已写入过一帧")]
  AlreadyWritten,
}

/// 编码完成的媒体数据
#[derive(Debug, Clone)]
pub struct EncodedMedia {
  pub mime: &'static str,
  pub bytes: Vec<u8>,
}

impl EncodedMedia {
  pub fn to_data_uri(&self) -> String {
    data_uri(self.mime, &self.bytes)
  }
}

/// 输出写入器：接收原始帧与检测结果，绘制后缓存，`finish` 时编码
pub trait OutputWriter {
  /// 写入一帧
  fn write_frame(&mut self, image: RgbImage, result: &DetectResult) -> Result<(), OutputError>;

  /// 已写入的帧数
  fn frames_written(&self) -> usize;

  /// 完成写入并返回编码结果
  fn finish(self) -> Result<EncodedMedia, OutputError>
  where
    Self: Sized;
}
