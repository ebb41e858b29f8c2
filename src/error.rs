//! Error types and the handler-level [`axum::response::IntoResponse`] mapping.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

use crate::exam::ExamPhase;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExamError {
  #[error("no exam in progress (phase: {0:?})")]
  NotActive(ExamPhase),

  #[error("answer the current question before moving on")]
  NotRevealed,

  #[error("results are not available yet (phase: {0:?})")]
  NoResults(ExamPhase),
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("storage I/O error on slot {slot}: {source}")]
  Io {
    slot: String,
    #[source]
    source: std::io::Error,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
  #[error("no AI credential configured; add one in settings first")]
  MissingCredential,

  #[error("a request is already in flight")]
  Busy,

  #[error("{0}")]
  Provider(String),

  #[error("response discarded: the conversation or document changed while waiting")]
  Stale,
}

/// Error returned by HTTP handlers and the WS dispatcher.
#[derive(Debug, Error)]
pub enum AppError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Exam(#[from] ExamError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Gateway(#[from] GatewayError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
  pub fn status(&self) -> StatusCode {
    match self {
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Exam(_) => StatusCode::CONFLICT,
      AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Gateway(GatewayError::MissingCredential) => StatusCode::PRECONDITION_REQUIRED,
      AppError::Gateway(GatewayError::Busy) => StatusCode::TOO_MANY_REQUESTS,
      AppError::Gateway(GatewayError::Stale) => StatusCode::CONFLICT,
      AppError::Gateway(GatewayError::Provider(_)) => StatusCode::BAD_GATEWAY,
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
  }
}
