//! Review queue for face updates.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/enrollment-requests` | Pending, oldest first |
//! | `GET`  | `/enrollment-requests/:id/preview` | Raw image bytes |
//! | `POST` | `/enrollment-requests/:id/approve` | 409 unless pending |
//! | `POST` | `/enrollment-requests/:id/reject` | 409 unless pending |

use axum::{
  Json,
  extract::{Path, State},
  http::header,
  response::IntoResponse,
};
use rollcall_core::{
  enrollment::EnrollmentRequest, recognizer::FaceRecognizer, store::AttendanceStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /enrollment-requests`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
) -> Result<Json<Vec<EnrollmentRequest>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let requests = state
    .store
    .list_pending_requests()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(requests))
}

/// `GET /enrollment-requests/:id/preview`
pub async fn preview<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let request = state
    .store
    .get_request(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("enrollment request {id} not found")))?;
  Ok((
    [(header::CONTENT_TYPE, "application/octet-stream")],
    request.preview_image,
  ))
}

/// `POST /enrollment-requests/:id/approve`
pub async fn approve<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EnrollmentRequest>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let request = state
    .store
    .approve_request(id)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(request_id = %id, person_id = %request.person_id, "face update approved");
  Ok(Json(request))
}

/// `POST /enrollment-requests/:id/reject`
pub async fn reject<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EnrollmentRequest>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let request = state
    .store
    .reject_request(id)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(request_id = %id, person_id = %request.person_id, "face update rejected");
  Ok(Json(request))
}
