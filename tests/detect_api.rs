// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/detect_api.rs - HTTP 接口测试
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

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::{AnimationDecoder, Delay, Frame, ImageFormat, Rgb, RgbImage, Rgba};
use serde_json::Value;
use tower::ServiceExt;

use shanan_serve::{
  model::{DetectResult, Detection, Detector, ModelError},
  output::Draw,
  server::{AppState, ServiceConfig, router},
};

const BOUNDARY: &str = "shanan-test-boundary";

/// 把亮像素的外接矩形当作一个目标
#[derive(Default)]
struct BrightBoxDetector {
  calls: AtomicUsize,
}

impl Detector for BrightBoxDetector {
  fn detect(&self, image: &RgbImage) -> Result<DetectResult, ModelError> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    let mut bbox: Option<[i32; 4]> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
      if pixel.0.iter().all(|&c| c > 200) {
        let (x, y) = (x as i32, y as i32);
        bbox = Some(match bbox {
          None => [x, y, x, y],
          Some([x1, y1, x2, y2]) => [x1.min(x), y1.min(y), x2.max(x), y2.max(y)],
        });
      }
    }

    Ok(
      bbox
        .map(|bbox| Detection {
          bbox,
          confidence: 0.9,
          class_id: 0,
          class_name: "object".to_string(),
        })
        .into_iter()
        .collect::<Vec<_>>()
        .into(),
    )
  }
}

struct Harness {
  detector: Arc<BrightBoxDetector>,
  temp_dir: tempfile::TempDir,
  app: axum::Router,
}

impl Harness {
  fn new() -> Self {
    let detector = Arc::new(BrightBoxDetector::default());
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
      temp_dir: Some(temp_dir.path().to_path_buf()),
      ..ServiceConfig::default()
    };
    let state = AppState::new(detector.clone(), Draw::new().unwrap(), config);
    Self {
      detector,
      temp_dir,
      app: router(state),
    }
  }

  fn detector_calls(&self) -> usize {
    self.detector.calls.load(Ordering::SeqCst)
  }

  fn temp_dir_is_empty(&self) -> bool {
    dir_is_empty(self.temp_dir.path())
  }

  async fn upload(&self, uri: &str, field: &str, file_name: &str, bytes: &[u8]) -> (StatusCode, Value) {
    let request = Request::builder()
      .method("POST")
      .uri(uri)
      .header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
      )
      .body(Body::from(multipart_body(field, file_name, bytes)))
      .unwrap();
    send(self.app.clone(), request).await
  }
}

fn dir_is_empty(dir: &Path) -> bool {
  std::fs::read_dir(dir).unwrap().next().is_none()
}

fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
  let mut body = Vec::new();
  body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
  body.extend_from_slice(
    format!(
      "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
      field, file_name
    )
    .as_bytes(),
  );
  body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
  body.extend_from_slice(bytes);
  body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
  body
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
  let response = app.oneshot(request).await.unwrap();
  let status = response.status();
  let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&body).unwrap())
}

fn decode_data_uri(uri: &str, mime: &str) -> Vec<u8> {
  let prefix = format!("data:{};base64,", mime);
  let payload = uri.strip_prefix(&prefix).expect("unexpected data uri prefix");
  STANDARD.decode(payload).unwrap()
}

/// 黑底上一个白色矩形 [20, 15] - [40, 30]
fn scene() -> RgbImage {
  let mut image = RgbImage::new(64, 48);
  for y in 15..=30 {
    for x in 20..=40 {
      image.put_pixel(x, y, Rgb([255, 255, 255]));
    }
  }
  image
}

fn png_bytes(image: &RgbImage) -> Vec<u8> {
  let mut bytes = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
    .unwrap();
  bytes
}

fn gif_bytes(frames: usize, delay_ms: u32) -> Vec<u8> {
  let rgba = image::DynamicImage::ImageRgb8(scene()).into_rgba8();
  let mut bytes = Vec::new();
  {
    let mut encoder = GifEncoder::new(&mut bytes);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    for _ in 0..frames {
      encoder
        .encode_frame(Frame::from_parts(
          rgba.clone(),
          0,
          0,
          Delay::from_numer_denom_ms(delay_ms, 1),
        ))
        .unwrap();
    }
  }
  bytes
}

fn is_greenish(pixel: &Rgba<u8>) -> bool {
  pixel[1] > 200 && pixel[0] < 80 && pixel[2] < 80
}

#[tokio::test]
async fn root_reports_running() {
  let harness = Harness::new();
  let request = Request::builder().uri("/").body(Body::empty()).unwrap();
  let (status, body) = send(harness.app.clone(), request).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "API Running");
}

#[tokio::test]
async fn image_keeps_dimensions() {
  let harness = Harness::new();
  let (status, body) = harness
    .upload("/detect-image", "file", "scene.png", &png_bytes(&scene()))
    .await;
  assert_eq!(status, StatusCode::OK);

  let jpeg = decode_data_uri(body["annotated_image"].as_str().unwrap(), "image/jpeg");
  assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
  let annotated = image::load_from_memory(&jpeg).unwrap().into_rgb8();
  assert_eq!(annotated.dimensions(), (64, 48));
  assert_eq!(harness.detector_calls(), 1);

  let edge = annotated.get_pixel(21, 22);
  assert!(edge[1] > 150 && edge[0] < 120 && edge[2] < 120, "{edge:?}");
}

#[tokio::test]
async fn legacy_detect_route_is_image_route() {
  let harness = Harness::new();
  let (status, body) = harness
    .upload("/detect", "file", "scene.png", &png_bytes(&scene()))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert!(
    body["annotated_image"]
      .as_str()
      .unwrap()
      .starts_with("data:image/jpeg;base64,")
  );
}

#[tokio::test]
async fn undecodable_image_is_server_error() {
  let harness = Harness::new();
  let (status, body) = harness
    .upload("/detect-image", "file", "broken.png", b"not really a png")
    .await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert!(body["detail"].is_string());
  assert_eq!(harness.detector_calls(), 0);
}

#[tokio::test]
async fn missing_file_field_is_unprocessable() {
  let harness = Harness::new();
  let (status, body) = harness
    .upload("/detect-video", "attachment", "clip.gif", &gif_bytes(2, 100))
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["detail"], "Field required: file");
}

#[tokio::test]
async fn video_frames_are_all_annotated() {
  let harness = Harness::new();
  let (status, body) = harness
    .upload("/detect-video", "file", "clip.gif", &gif_bytes(90, 33))
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(harness.detector_calls(), 90);
  assert!(harness.temp_dir_is_empty());

  let gif = decode_data_uri(body["annotated_video"].as_str().unwrap(), "image/gif");
  let frames = GifDecoder::new(Cursor::new(gif))
    .unwrap()
    .into_frames()
    .collect_frames()
    .unwrap();
  assert_eq!(frames.len(), 90);
  for frame in &frames {
    let buffer = frame.buffer();
    assert_eq!(buffer.dimensions(), (64, 48));
    assert!(is_greenish(buffer.get_pixel(20, 22)));
    assert!(is_greenish(buffer.get_pixel(40, 22)));
  }
}

#[tokio::test]
async fn empty_video_cannot_be_opened() {
  let harness = Harness::new();
  let (status, body) = harness.upload("/detect-video", "file", "empty.mp4", &[]).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["detail"], "Could not open video file");
  assert!(harness.temp_dir_is_empty());
}

#[tokio::test]
async fn long_video_is_rejected_without_detection() {
  let harness = Harness::new();
  // 150 帧 × 100 ms = 15 s
  let (status, body) = harness
    .upload("/detect-video", "file", "long.gif", &gif_bytes(150, 100))
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["detail"], "Video duration exceeds 10 seconds");
  assert_eq!(harness.detector_calls(), 0);
  assert!(harness.temp_dir_is_empty());
}

#[tokio::test]
async fn corrupt_video_is_bad_request() {
  let harness = Harness::new();
  let (status, body) = harness
    .upload("/detect-video", "file", "corrupt.mp4", b"\x00\x01\x02 definitely not a container")
    .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["detail"].is_string());
  assert_eq!(harness.detector_calls(), 0);
  assert!(harness.temp_dir_is_empty());
}

#[tokio::test]
async fn cors_mirrors_origin_with_credentials() {
  let harness = Harness::new();
  let request = Request::builder()
    .uri("/")
    .header(header::ORIGIN, "http://localhost:3000")
    .body(Body::empty())
    .unwrap();
  let response = harness.app.clone().oneshot(request).await.unwrap();
  let headers = response.headers();
  assert_eq!(
    headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
    "http://localhost:3000"
  );
  assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
}
