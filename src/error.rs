//! Error types: grader client failures (always degraded by callers) and API errors.

use axum::{extract::rejection::JsonRejection, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraderError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("OpenAI HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("reply contained no JSON object")]
  NoJson,

  #[error("JSON parse error: {0}")]
  Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),
}

impl AppError {
  pub fn not_found<S: Into<String>>(msg: S) -> Self {
    AppError::NotFound(msg.into())
  }

  pub fn bad_request<S: Into<String>>(msg: S) -> Self {
    AppError::BadRequest(msg.into())
  }

  pub fn status(&self) -> StatusCode {
    match self {
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
    }
  }
}

/// Malformed JSON bodies answer 400 `{error}` instead of axum's plain-text 422.
impl From<JsonRejection> for AppError {
  fn from(rejection: JsonRejection) -> Self {
    AppError::BadRequest(rejection.body_text())
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
  }
}
