//! Attendance sessions, detections and face verification.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/offerings/:id/sessions` | Ordered by session number |
//! | `POST` | `/offerings/:id/sessions` | 201 started, 200 resumed |
//! | `GET`  | `/offerings/:id/sessions/active` | 404 if none is running |
//! | `GET`  | `/sessions/:id` | |
//! | `POST` | `/sessions/:id/close` | Idempotent |
//! | `POST` | `/sessions/:id/detections` | Body: `{"person_identifier":"S-001","confidence":0.91}` |
//! | `POST` | `/sessions/:id/verify` | Body: `{"image":"<base64>"}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  Error as CoreError,
  attendance::{AttendanceRecord, AttendanceSession},
  pipeline::{self, Verification},
  recognizer::FaceRecognizer,
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError, image::decode_image};

// ─── Per offering ─────────────────────────────────────────────────────────────

/// `GET /offerings/:id/sessions`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
  Path(offering_id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceSession>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  state
    .store
    .get_offering(offering_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("offering {offering_id} not found")))?;

  let sessions = state
    .store
    .list_sessions(offering_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(sessions))
}

/// `POST /offerings/:id/sessions`: start the next session, or return the
/// running one.
pub async fn start<S, R>(
  State(state): State<AppState<S, R>>,
  Path(offering_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let started = pipeline::start_or_resume(state.store.as_ref(), offering_id)
    .await
    .map_err(ApiError::from_store)?;
  let code = if started.resumed { StatusCode::OK } else { StatusCode::CREATED };
  Ok((code, Json(started)))
}

/// `GET /offerings/:id/sessions/active`
pub async fn active<S, R>(
  State(state): State<AppState<S, R>>,
  Path(offering_id): Path<Uuid>,
) -> Result<Json<AttendanceSession>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let session = state
    .store
    .active_session(offering_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("offering {offering_id} has no active session"))
    })?;
  Ok(Json(session))
}

// ─── Per session ──────────────────────────────────────────────────────────────

/// `GET /sessions/:id`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AttendanceSession>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let session = state
    .store
    .get_session(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))?;
  Ok(Json(session))
}

/// `POST /sessions/:id/close`
pub async fn close<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AttendanceSession>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let session = state
    .store
    .close_session(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct DetectionBody {
  pub person_identifier: String,
  #[serde(default)]
  pub confidence:        Option<f32>,
}

/// `POST /sessions/:id/detections`: mark a person present by identifier.
pub async fn record<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<DetectionBody>,
) -> Result<Json<AttendanceRecord>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let record = state
    .store
    .record_detection(id, body.person_identifier, body.confidence)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub image: String,
}

/// `POST /sessions/:id/verify`
///
/// A face that matches nobody is still a 200; `matched` tells the caller.
pub async fn verify<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<VerifyBody>,
) -> Result<Json<Verification>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let image = decode_image(&body.image).map_err(CoreError::from)?;
  let verification = pipeline::verify(
    state.store.as_ref(),
    state.recognizer.as_ref(),
    state.threshold,
    id,
    &image,
  )
  .await
  .map_err(ApiError::from_store)?;
  Ok(Json(verification))
}
