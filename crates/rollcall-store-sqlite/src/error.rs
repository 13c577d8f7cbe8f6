//! Error type for `rollcall-store-sqlite`.

use rollcall_core::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain outcome: not found, conflict, invalid state, and so on.
  #[error(transparent)]
  Core(#[from] rollcall_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("column decode error: {0}")]
  Decode(String),
}

impl DomainError for Error {
  fn domain(&self) -> Option<&rollcall_core::Error> {
    match self {
      Error::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
