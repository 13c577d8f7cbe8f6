//! The face recognizer adapter.
//!
//! Detection and embedding extraction happen outside this workspace. An
//! adapter is constructed once at startup (models loaded, clients built) and
//! passed by reference into every pipeline call.

use std::future::Future;

use crate::{embedding::Embedding, error::DetectionError};

/// Turns raw image bytes into a probe vector.
///
/// Implementations pick the single best face when an image holds several, and
/// must return vectors comparable with those already enrolled.
pub trait FaceRecognizer: Send + Sync {
  fn detect_and_embed<'a>(
    &'a self,
    image: &'a [u8],
  ) -> impl Future<Output = Result<Embedding, DetectionError>> + Send + 'a;
}
