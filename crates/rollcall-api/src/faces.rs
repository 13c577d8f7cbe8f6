//! Face enrollment for one person.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/people/:id/face` | Enrollment status |
//! | `POST` | `/people/:id/face` | Body: `{"images":["<base64>", …]}`; 201 enrolled, 202 queued |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  Error as CoreError,
  enrollment::{CaptureOutcome, EnrollmentStatus},
  pipeline,
  recognizer::FaceRecognizer,
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, image::decode_image};

/// `GET /people/:id/face`
pub async fn status<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EnrollmentStatus>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let status = pipeline::enrollment_status(state.store.as_ref(), id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct CaptureBody {
  pub images: Vec<String>,
}

/// `POST /people/:id/face`
///
/// A first capture is enrolled immediately; later ones wait for review.
pub async fn capture<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<CaptureBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let images = body
    .images
    .iter()
    .map(|payload| decode_image(payload))
    .collect::<Result<Vec<_>, _>>()
    .map_err(CoreError::from)?;

  let outcome = pipeline::capture(state.store.as_ref(), state.recognizer.as_ref(), id, &images)
    .await
    .map_err(ApiError::from_store)?;

  let code = match outcome {
    CaptureOutcome::Enrolled { .. } => StatusCode::CREATED,
    CaptureOutcome::Queued { .. } => StatusCode::ACCEPTED,
  };
  Ok((code, Json(outcome)))
}
