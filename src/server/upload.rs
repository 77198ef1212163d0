// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server/upload.rs - multipart 上传读取
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

use axum_extra::extract::Multipart;
use axum_extra::extract::multipart::MultipartError;
use tracing::debug;

use super::ApiError;

pub const UPLOAD_FIELD: &str = "file";

/// 一个上传文件
pub struct Upload {
  pub file_name: Option<String>,
  pub bytes: Vec<u8>,
}

fn upload_error(err: MultipartError) -> ApiError {
  ApiError::Upload {
    status: err.status(),
    message: err.body_text(),
  }
}

/// 读取名为 `file` 的字段，其余字段忽略
pub async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
  while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
    if field.name() != Some(UPLOAD_FIELD) {
      continue;
    }
    let file_name = field.file_name().map(str::to_string);
    let bytes = field.bytes().await.map_err(upload_error)?;
    debug!(
      "收到上传: {:?}, {} 字节",
      file_name.as_deref().unwrap_or("<unnamed>"),
      bytes.len()
    );
    return Ok(Upload {
      file_name,
      bytes: bytes.to_vec(),
    });
  }

  Err(ApiError::MissingField(UPLOAD_FIELD))
}
