//! Image payloads: base64 text, optionally wrapped in a `data:` URL.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rollcall_core::DetectionError;

/// Decode one uploaded image into raw bytes.
///
/// Accepts `data:image/jpeg;base64,<payload>` as browsers produce it, or the
/// bare payload.
pub fn decode_image(payload: &str) -> Result<Vec<u8>, DetectionError> {
  let encoded = match payload.strip_prefix("data:") {
    Some(url) => {
      let (meta, data) = url
        .split_once(',')
        .ok_or_else(|| DetectionError::Decode("data URL has no payload".into()))?;
      if !meta.ends_with(";base64") {
        return Err(DetectionError::Decode("data URL is not base64-encoded".into()));
      }
      data
    }
    None => payload,
  };

  let bytes = B64
    .decode(encoded.trim())
    .map_err(|e| DetectionError::Decode(e.to_string()))?;
  if bytes.is_empty() {
    return Err(DetectionError::Decode("image is empty".into()));
  }
  Ok(bytes)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_payload() {
    assert_eq!(decode_image("aGVsbG8=").unwrap(), b"hello");
  }

  #[test]
  fn data_url_payload() {
    let bytes = decode_image("data:image/jpeg;base64,aGVsbG8=").unwrap();
    assert_eq!(bytes, b"hello");
  }

  #[test]
  fn rejects_garbage() {
    assert!(matches!(decode_image("not base64!"), Err(DetectionError::Decode(_))));
    assert!(matches!(decode_image("data:image/png,raw"), Err(DetectionError::Decode(_))));
    assert!(matches!(decode_image(""), Err(DetectionError::Decode(_))));
  }
}
