//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use rollcall_core::{DomainError, Error as CoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  /// A uniqueness or state-machine violation.
  #[error("{0}")]
  Conflict(String),

  /// The recognizer rejected the image.
  #[error("{0}")]
  Unprocessable(String),

  #[error("invalid login or password")]
  Unauthorized,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store error by the domain outcome it carries; anything else
  /// is an internal failure.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    let classified = match e.domain() {
      Some(d @ CoreError::NotFound { .. }) => Some(ApiError::NotFound(d.to_string())),
      Some(d @ (CoreError::Conflict(_) | CoreError::InvalidState(_))) => {
        Some(ApiError::Conflict(d.to_string()))
      }
      Some(CoreError::Detection(d)) => Some(ApiError::Unprocessable(d.to_string())),
      Some(CoreError::InvalidInput(m)) => Some(ApiError::BadRequest(m.clone())),
      _ => None,
    };
    classified.unwrap_or_else(|| ApiError::Store(Box::new(e)))
  }
}

impl From<CoreError> for ApiError {
  fn from(e: CoreError) -> Self { Self::from_store(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Store(e) => {
        tracing::error!(error = %e, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
