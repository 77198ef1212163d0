// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/labels.rs - 类别名称
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

pub fn class_name_or_unknown<S: AsRef<str>>(names: &[S], class_id: u32) -> String {
  names
    .get(class_id as usize)
    .map(|s| s.as_ref().to_string())
    .unwrap_or_else(|| format!("class{}", class_id))
}

/// 解析导出模型元数据中的 `names` 字段。
///
/// 格式为 Python 字典字面量，例如 `{0: 'person', 1: 'bicycle'}`。
/// 索引不连续或格式无法识别时返回 `None`。
pub fn parse_names_metadata(raw: &str) -> Option<Vec<String>> {
  let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;
  let mut entries = Vec::new();

  let mut rest = body;
  while !rest.trim().is_empty() {
    let (key, after_key) = rest.split_once(':')?;
    let index: usize = key.trim().trim_start_matches(',').trim().parse().ok()?;

    let after_key = after_key.trim_start();
    let quote = after_key.chars().next()?;
    if quote != '\'' && quote != '"' {
      return None;
    }
    let value_start = &after_key[1..];
    let end = value_start.find(quote)?;
    entries.push((index, value_start[..end].to_string()));
    rest = &value_start[end + 1..];
  }

  if entries.is_empty() {
    return None;
  }
  entries.sort_by_key(|(index, _)| *index);
  if entries.iter().enumerate().any(|(i, (index, _))| i != *index) {
    return None;
  }

  Some(entries.into_iter().map(|(_, name)| name).collect())
}
