//! Error types for `rollcall-core`.

use thiserror::Error;

/// Why the recognizer adapter could not produce a usable probe vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
  #[error("no face detected; re-frame the face and try again")]
  NoFaceFound,

  #[error("image could not be decoded: {0}")]
  Decode(String),

  #[error("recognizer unavailable: {0}")]
  Unavailable(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{entity} not found: {id}")]
  NotFound { entity: &'static str, id: String },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("detection failed: {0}")]
  Detection(#[from] DetectionError),

  #[error("corrupt embedding: {0}")]
  CorruptEmbedding(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
    Self::NotFound { entity, id: id.to_string() }
  }
}

/// Exposes the domain error carried by a backend-specific error type, if any.
///
/// Storage backends wrap [`Error`] in their own error enums alongside I/O
/// failures; presentation layers use this to tell the two apart.
pub trait DomainError {
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
