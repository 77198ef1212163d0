// 该文件是 Shanan （山南西风） 项目的一部分。
// src/server/error.rs - HTTP 错误响应
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

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::task::TaskError;

/// 以 `{"detail": "..."}` 形式返回给客户端的错误
#[derive(Error, Debug)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),
  #[error("Field required: {0}")]
  MissingField(&'static str),
  #[error("{message}")]
  Upload { status: StatusCode, message: String },
  #[error("{0}")]
  Internal(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Upload { status, .. } => *status,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<TaskError> for ApiError {
  fn from(err: TaskError) -> Self {
    match err {
      TaskError::OpenVideo(_) | TaskError::DurationExceeded { .. } | TaskError::NoFrames => {
        ApiError::BadRequest(err.to_string())
      }
      other => ApiError::Internal(other.to_string()),
    }
  }
}

impl From<tokio::task::JoinError> for ApiError {
  fn from(err: tokio::task::JoinError) -> Self {
    ApiError::Internal(format!("Worker task failed: {}", err))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("请求处理失败: {}", self);
    }
    (status, Json(json!({ "detail": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::InputError;

  #[test]
  fn validation_failures_are_bad_requests() {
    let open: ApiError = TaskError::OpenVideo(InputError::EmptyFile).into();
    assert_eq!(open.status(), StatusCode::BAD_REQUEST);
    assert_eq!(open.to_string(), "Could not open video file");

    let long: ApiError = TaskError::DurationExceeded {
      limit_secs: 10.0,
      duration_secs: 15.0,
    }
    .into();
    assert_eq!(long.status(), StatusCode::BAD_REQUEST);
    assert_eq!(long.to_string(), "Video duration exceeds 10 seconds");

    let empty: ApiError = TaskError::NoFrames.into();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
  }

  #[test]
  fn processing_failures_are_internal() {
    let err: ApiError = TaskError::TempFile(std::io::Error::other("disk full")).into();
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn missing_field_is_unprocessable() {
    let err = ApiError::MissingField("file");
    assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err.to_string(), "Field required: file");
  }
}
