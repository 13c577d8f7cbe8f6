//! HTTP client for an out-of-process face recognizer.
//!
//! The recognizer receives raw image bytes and answers with the embedding of
//! the most prominent face, either as a bare JSON array or as
//! `{"embedding": [...]}`. `422`/`404` mean no face was found and `400` means
//! the image could not be decoded.

use std::{future::Future, time::Duration};

use anyhow::Context as _;
use reqwest::{Client, StatusCode, header};
use rollcall_core::{DetectionError, Embedding, recognizer::FaceRecognizer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
  Bare(Vec<f32>),
  Wrapped { embedding: Vec<f32> },
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RemoteRecognizer {
  client: Client,
  url:    String,
}

impl RemoteRecognizer {
  pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .context("failed to build recognizer HTTP client")?;
    Ok(Self { client, url: url.into() })
  }

  async fn embed(&self, image: &[u8]) -> Result<Embedding, DetectionError> {
    let resp = self
      .client
      .post(&self.url)
      .header(header::CONTENT_TYPE, "application/octet-stream")
      .body(image.to_vec())
      .send()
      .await
      .map_err(|e| DetectionError::Unavailable(e.to_string()))?;

    match resp.status() {
      status if status.is_success() => {}
      StatusCode::UNPROCESSABLE_ENTITY | StatusCode::NOT_FOUND => {
        return Err(DetectionError::NoFaceFound);
      }
      StatusCode::BAD_REQUEST => {
        let detail = resp.text().await.unwrap_or_default();
        return Err(DetectionError::Decode(detail));
      }
      status => {
        return Err(DetectionError::Unavailable(format!("recognizer returned {status}")));
      }
    }

    let values = match resp.json::<EmbedResponse>().await {
      Ok(EmbedResponse::Bare(values) | EmbedResponse::Wrapped { embedding: values }) => values,
      Err(e) => return Err(DetectionError::Unavailable(format!("malformed embedding: {e}"))),
    };
    if values.is_empty() {
      return Err(DetectionError::Unavailable("recognizer returned an empty embedding".into()));
    }
    Ok(Embedding::new(values))
  }
}

impl FaceRecognizer for RemoteRecognizer {
  fn detect_and_embed<'a>(
    &'a self,
    image: &'a [u8],
  ) -> impl Future<Output = Result<Embedding, DetectionError>> + Send + 'a {
    self.embed(image)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};
  use serde_json::json;
  use tokio::net::TcpListener;

  /// Serve `app` on an ephemeral port and return its base URL.
  async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
  }

  fn recognizer(base: &str, path: &str) -> RemoteRecognizer {
    RemoteRecognizer::new(format!("{base}{path}"), Duration::from_secs(5)).unwrap()
  }

  #[tokio::test]
  async fn parses_both_response_shapes() {
    let base = serve(
      Router::new()
        .route("/bare", post(|| async { Json(json!([0.6, 0.8])) }))
        .route("/wrapped", post(|| async { Json(json!({ "embedding": [1.0, 0.0] })) })),
    )
    .await;

    let bare = recognizer(&base, "/bare").detect_and_embed(b"img").await.unwrap();
    assert_eq!(bare, Embedding::new(vec![0.6, 0.8]));

    let wrapped = recognizer(&base, "/wrapped").detect_and_embed(b"img").await.unwrap();
    assert_eq!(wrapped, Embedding::new(vec![1.0, 0.0]));
  }

  #[tokio::test]
  async fn maps_failure_statuses() {
    let base = serve(
      Router::new()
        .route("/noface", post(|| async { AxumStatus::UNPROCESSABLE_ENTITY }))
        .route("/garbled", post(|| async { (AxumStatus::BAD_REQUEST, "bad jpeg") }))
        .route("/down", post(|| async { AxumStatus::SERVICE_UNAVAILABLE }))
        .route("/empty", post(|| async { Json(json!([])) })),
    )
    .await;

    let err = recognizer(&base, "/noface").detect_and_embed(b"img").await.unwrap_err();
    assert_eq!(err, DetectionError::NoFaceFound);

    let err = recognizer(&base, "/garbled").detect_and_embed(b"img").await.unwrap_err();
    assert_eq!(err, DetectionError::Decode("bad jpeg".into()));

    let err = recognizer(&base, "/down").detect_and_embed(b"img").await.unwrap_err();
    assert!(matches!(err, DetectionError::Unavailable(_)));

    let err = recognizer(&base, "/empty").detect_and_embed(b"img").await.unwrap_err();
    assert!(matches!(err, DetectionError::Unavailable(_)));
  }

  #[tokio::test]
  async fn unreachable_recognizer_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = recognizer(&format!("http://{addr}"), "/embed")
      .detect_and_embed(b"img")
      .await
      .unwrap_err();
    assert!(matches!(err, DetectionError::Unavailable(_)));
  }
}
