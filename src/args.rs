// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 服务参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

use shanan_serve::server::ServiceConfig;

/// Shanan 检测服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "SHANAN_BIND", default_value = "0.0.0.0:8000", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 模型地址，例如 yolov8:///models/yolov8n.onnx?conf=0.25&iou=0.7&threads=4
  #[arg(long, env = "SHANAN_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 视频时长上限（秒）
  #[arg(long, env = "SHANAN_MAX_VIDEO_SECS", default_value = "10", value_name = "SECS")]
  pub max_video_secs: f64,

  /// JPEG 质量 (1 - 100)
  #[arg(long, env = "SHANAN_JPEG_QUALITY", default_value = "95", value_name = "QUALITY")]
  pub jpeg_quality: u8,

  /// GIF 量化速度 (1 - 30)，越小质量越好
  #[arg(long, env = "SHANAN_GIF_SPEED", default_value = "10", value_name = "SPEED")]
  pub gif_speed: i32,

  /// 上传大小上限（字节）
  #[arg(long, env = "SHANAN_MAX_UPLOAD_BYTES", default_value = "104857600", value_name = "BYTES")]
  pub max_upload_bytes: usize,

  /// 临时文件目录，默认使用系统临时目录
  #[arg(long, env = "SHANAN_TEMP_DIR", value_name = "DIR")]
  pub temp_dir: Option<PathBuf>,

  /// 标注字体文件（TTF/OTF），默认使用内置 DejaVu Sans
  #[arg(long, env = "SHANAN_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,
}

impl Args {
  pub fn service_config(&self) -> ServiceConfig {
    ServiceConfig {
      max_video_secs: self.max_video_secs,
      jpeg_quality: self.jpeg_quality,
      gif_speed: self.gif_speed,
      max_upload_bytes: self.max_upload_bytes,
      temp_dir: self.temp_dir.clone(),
    }
  }
}
