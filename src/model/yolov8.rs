// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;
use std::sync::Mutex;

use image::{Rgb, RgbImage, imageops::FilterType};
use ndarray::Array4;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    COCO_CLASSES, DetectResult, Detection, Detector, ModelError, class_name_or_unknown,
    parse_names_metadata,
  },
};

const YOLOV8_INPUT_SIZE: u32 = 640;
const YOLOV8_PAD_VALUE: u8 = 114;
const YOLOV8_BOX_FIELDS: usize = 4;
const YOLOV8_DEFAULT_CONF: f32 = 0.25;
const YOLOV8_DEFAULT_IOU: f32 = 0.7;
const YOLOV8_DEFAULT_THREADS: usize = 4;
const YOLOV8_MAX_DETECTIONS: usize = 300;

/// 缩放 + 填充参数，用于把模型坐标映射回原图
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
}

impl Letterbox {
  fn for_image(width: u32, height: u32, target: u32) -> Self {
    let scale = (target as f32 / width as f32).min(target as f32 / height as f32);
    let new_w = (width as f32 * scale).round();
    let new_h = (height as f32 * scale).round();
    Letterbox {
      scale,
      pad_x: ((target as f32 - new_w) / 2.0).floor(),
      pad_y: ((target as f32 - new_h) / 2.0).floor(),
    }
  }

  fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
    ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
  }
}

/// NMS 之前的候选框，坐标为原图浮点像素
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
  pub bbox: [f32; 4],
  pub score: f32,
  pub class_id: u32,
}

pub struct YoloV8Builder {
  model_path: String,
  confidence_threshold: f32,
  nms_threshold: f32,
  intra_threads: usize,
}

impl FromUrlWithScheme for YoloV8Builder {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for YoloV8Builder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    let parse_f32 = |key: &str, default: f32| -> Result<f32, ModelError> {
      match query.get(key) {
        Some(v) => v
          .parse::<f32>()
          .map(|v| v.clamp(0.0, 1.0))
          .map_err(|_| ModelError::ModelPathError(format!("参数 {} 无效: {}", key, v))),
        None => Ok(default),
      }
    };

    let intra_threads = match query.get("threads") {
      Some(v) => v
        .parse::<usize>()
        .map_err(|_| ModelError::ModelPathError(format!("参数 threads 无效: {}", v)))?,
      None => YOLOV8_DEFAULT_THREADS,
    };

    Ok(YoloV8Builder {
      model_path: url.path().to_string(),
      confidence_threshold: parse_f32("conf", YOLOV8_DEFAULT_CONF)?,
      nms_threshold: parse_f32("iou", YOLOV8_DEFAULT_IOU)?,
      intra_threads,
    })
  }
}

impl YoloV8Builder {
  pub fn new(model_path: impl Into<String>) -> Self {
    YoloV8Builder {
      model_path: model_path.into(),
      confidence_threshold: YOLOV8_DEFAULT_CONF,
      nms_threshold: YOLOV8_DEFAULT_IOU,
      intra_threads: YOLOV8_DEFAULT_THREADS,
    }
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold.clamp(0.0, 1.0);
    self
  }

  pub fn nms_threshold(mut self, threshold: f32) -> Self {
    self.nms_threshold = threshold.clamp(0.0, 1.0);
    self
  }

  pub fn build(self) -> Result<YoloV8, ModelError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()
      .map_err(ModelError::runtime)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(ModelError::runtime)?
      .with_intra_threads(self.intra_threads)
      .map_err(ModelError::runtime)?
      .commit_from_memory(&model_data)
      .map_err(ModelError::runtime)?;

    let input_name = first_port_name(
      session.inputs.first().map(|input| input.name.as_str()),
      "输入",
    )?;
    let output_name = first_port_name(
      session.outputs.first().map(|output| output.name.as_str()),
      "输出",
    )?;

    let names = session
      .metadata()
      .ok()
      .and_then(|meta| meta.custom("names").ok().flatten())
      .and_then(|raw| parse_names_metadata(&raw))
      .unwrap_or_else(|| {
        warn!("模型元数据中没有类别名称，使用 COCO 类别");
        COCO_CLASSES.iter().map(|s| s.to_string()).collect()
      });

    info!(
      "模型加载完成: 输入 {}, 输出 {}, 类别数 {}, 置信度阈值 {}, NMS 阈值 {}",
      input_name,
      output_name,
      names.len(),
      self.confidence_threshold,
      self.nms_threshold
    );

    Ok(YoloV8 {
      session: Mutex::new(session),
      input_name,
      output_name,
      names,
      confidence_threshold: self.confidence_threshold,
      nms_threshold: self.nms_threshold,
    })
  }
}

/// YOLOv8 目标检测器
///
/// 会话由互斥锁保护，多个请求并发调用时推理串行执行。
pub struct YoloV8 {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  names: Vec<String>,
  confidence_threshold: f32,
  nms_threshold: f32,
}

impl YoloV8 {
  pub fn class_names(&self) -> &[String] {
    &self.names
  }

  fn preprocess(image: &RgbImage) -> Result<(Array4<f32>, Letterbox), ModelError> {
    let size = YOLOV8_INPUT_SIZE;
    let letterbox = Letterbox::for_image(image.width(), image.height(), size);
    let new_w = ((image.width() as f32 * letterbox.scale).round() as u32).clamp(1, size);
    let new_h = ((image.height() as f32 * letterbox.scale).round() as u32).clamp(1, size);

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([YOLOV8_PAD_VALUE; 3]));
    image::imageops::replace(
      &mut canvas,
      &resized,
      letterbox.pad_x as i64,
      letterbox.pad_y as i64,
    );

    // HWC u8 -> NCHW f32
    let plane = (size * size) as usize;
    let raw = canvas.as_raw();
    let mut data = vec![0f32; 3 * plane];
    for idx in 0..plane {
      data[idx] = raw[idx * 3] as f32 / 255.0;
      data[plane + idx] = raw[idx * 3 + 1] as f32 / 255.0;
      data[2 * plane + idx] = raw[idx * 3 + 2] as f32 / 255.0;
    }

    let tensor = Array4::from_shape_vec((1, 3, size as usize, size as usize), data)
      .map_err(ModelError::runtime)?;
    Ok((tensor, letterbox))
  }
}

impl Detector for YoloV8 {
  fn detect(&self, image: &RgbImage) -> Result<DetectResult, ModelError> {
    let (tensor, letterbox) = Self::preprocess(image)?;
    let input_value = Value::from_array(tensor).map_err(ModelError::runtime)?;

    debug!("执行模型推理");
    let (shape, data) = {
      let mut session = self
        .session
        .lock()
        .map_err(|_| ModelError::SessionPoisoned)?;
      let outputs = session
        .run(ort::inputs![&self.input_name => input_value])
        .map_err(ModelError::runtime)?;
      let output = outputs
        .get(self.output_name.as_str())
        .ok_or_else(|| ModelError::ModelInvalid(format!("模型缺少输出 {}", self.output_name)))?
        .try_extract_array::<f32>()
        .map_err(ModelError::runtime)?;
      let shape = output.shape().to_vec();
      let data: Vec<f32> = output.iter().copied().collect();
      (shape, data)
    };

    if shape.len() != 3 || shape[1] <= YOLOV8_BOX_FIELDS {
      return Err(ModelError::OutputShape(shape));
    }

    let candidates = decode_output(
      &data,
      shape[1] - YOLOV8_BOX_FIELDS,
      shape[2],
      letterbox,
      self.confidence_threshold,
    );
    let kept = non_max_suppression(candidates, self.nms_threshold);

    let items: Vec<Detection> = kept
      .into_iter()
      .take(YOLOV8_MAX_DETECTIONS)
      .map(|c| Detection {
        bbox: clamp_bbox(&c.bbox, image.width(), image.height()),
        confidence: c.score,
        class_id: c.class_id,
        class_name: class_name_or_unknown(&self.names, c.class_id),
      })
      .collect();

    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult::from(items))
  }
}

/// 取模型的第一个输入或输出名称
fn first_port_name(name: Option<&str>, kind: &str) -> Result<String, ModelError> {
  name
    .map(str::to_string)
    .ok_or_else(|| ModelError::ModelInvalid(format!("模型没有{}", kind)))
}

/// 解码 `[1, 4 + nc, N]` 输出，data 为行优先展开。
pub(crate) fn decode_output(
  data: &[f32],
  num_classes: usize,
  num_anchors: usize,
  letterbox: Letterbox,
  confidence_threshold: f32,
) -> Vec<Candidate> {
  let mut candidates = Vec::new();
  if data.len() < (YOLOV8_BOX_FIELDS + num_classes) * num_anchors {
    warn!("输出数据长度不足: {}", data.len());
    return candidates;
  }

  for i in 0..num_anchors {
    let mut best_score = f32::MIN;
    let mut best_class = 0usize;
    for c in 0..num_classes {
      let score = data[(YOLOV8_BOX_FIELDS + c) * num_anchors + i];
      if score > best_score {
        best_score = score;
        best_class = c;
      }
    }

    if best_score < confidence_threshold {
      continue;
    }

    let cx = data[i];
    let cy = data[num_anchors + i];
    let w = data[2 * num_anchors + i];
    let h = data[3 * num_anchors + i];

    let (x1, y1) = letterbox.unmap(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = letterbox.unmap(cx + w / 2.0, cy + h / 2.0);

    candidates.push(Candidate {
      bbox: [x1, y1, x2, y2],
      score: best_score,
      class_id: best_class as u32,
    });
  }

  candidates
}

/// 按类别进行非极大值抑制，结果按置信度降序
pub(crate) fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut result: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    let suppressed = result
      .iter()
      .any(|kept| kept.class_id == candidate.class_id && iou(&kept.bbox, &candidate.bbox) > iou_threshold);
    if !suppressed {
      result.push(candidate);
    }
  }

  result
}

/// 计算两个边界框的 IoU
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

fn clamp_bbox(bbox: &[f32; 4], width: u32, height: u32) -> [i32; 4] {
  let max_x = width.saturating_sub(1) as f32;
  let max_y = height.saturating_sub(1) as f32;
  [
    bbox[0].clamp(0.0, max_x) as i32,
    bbox[1].clamp(0.0, max_y) as i32,
    bbox[2].clamp(0.0, max_x) as i32,
    bbox[3].clamp(0.0, max_y) as i32,
  ]
}
