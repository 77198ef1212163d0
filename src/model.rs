// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use thiserror::Error;

mod labels;
pub use self::labels::{COCO_CLASSES, class_name_or_unknown, parse_names_metadata};

#[cfg(feature = "model_yolov8")]
mod yolov8;
#[cfg(feature = "model_yolov8")]
pub use self::yolov8::{YoloV8, YoloV8Builder};

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理运行时错误: {0}")]
  RuntimeError(String),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
  #[error("输出张量形状错误: {0:?}")]
  OutputShape(Vec<usize>),
}

impl ModelError {
  pub fn runtime<E: std::fmt::Display>(err: E) -> Self {
    ModelError::RuntimeError(err.to_string())
  }
}

impl From<std::io::Error> for ModelError {
  fn from(err: std::io::Error) -> Self {
    ModelError::ModelLoadError(err)
  }
}

/// 一个检测目标，bbox 为像素坐标 [x1, y1, x2, y2]
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: [i32; 4],
  pub confidence: f32,
  pub class_id: u32,
  pub class_name: String,
}

impl Detection {
  /// 标注文本，例如 `person 0.87`
  pub fn label(&self) -> String {
    format!("{} {:.2}", self.class_name, self.confidence)
  }
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

/// 检测器：输入一张解码后的图像，输出检测结果。
///
/// 实例在启动时加载一次，之后在所有请求间只读共享。
pub trait Detector: Send + Sync {
  fn detect(&self, image: &RgbImage) -> Result<DetectResult, ModelError>;
}

impl<D: Detector + ?Sized> Detector for std::sync::Arc<D> {
  fn detect(&self, image: &RgbImage) -> Result<DetectResult, ModelError> {
    (**self).detect(image)
  }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
  fn detect(&self, image: &RgbImage) -> Result<DetectResult, ModelError> {
    (**self).detect(image)
  }
}
