//! Handlers for `/offerings` endpoints and per-person summaries.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/offerings` | Body: `NewOffering` |
//! | `GET`    | `/offerings/:id` | 404 if not found |
//! | `DELETE` | `/offerings/:id` | Cascades to cohort, sessions and records |
//! | `PUT`    | `/offerings/:id/active` | Body: `{"active":false}` |
//! | `POST`   | `/offerings/:id/cohort` | Body: `{"person_id":"…"}` |
//! | `GET`    | `/offerings/:id/roster` | One summary per cohort member |
//! | `GET`    | `/offerings/:id/records` | Newest detection first |
//! | `GET`    | `/people/:id/offerings/:offering_id/summary` | |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  attendance::{AttendanceRecord, AttendanceSummary, RosterEntry},
  offering::{NewOffering, Offering},
  recognizer::FaceRecognizer,
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Lifecycle ────────────────────────────────────────────────────────────────

/// `POST /offerings`
pub async fn create<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<NewOffering>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let offering = state
    .store
    .add_offering(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(offering)))
}

/// `GET /offerings/:id`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Offering>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let offering = state
    .store
    .get_offering(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("offering {id} not found")))?;
  Ok(Json(offering))
}

/// `DELETE /offerings/:id`
pub async fn delete_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  state
    .store
    .delete_offering(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub active: bool,
}

/// `PUT /offerings/:id/active`: inactive offerings refuse new sessions.
pub async fn set_active<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ActiveBody>,
) -> Result<Json<Offering>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let offering = state
    .store
    .set_offering_active(id, body.active)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(offering))
}

// ─── Cohort ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
  pub person_id: Uuid,
}

/// `POST /offerings/:id/cohort`
pub async fn enroll<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<EnrollBody>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  state
    .store
    .enroll_in_offering(id, body.person_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /offerings/:id/roster`
pub async fn roster<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<RosterEntry>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let roster = state.store.roster(id).await.map_err(ApiError::from_store)?;
  Ok(Json(roster))
}

// ─── Attendance ───────────────────────────────────────────────────────────────

/// `GET /offerings/:id/records`
pub async fn records<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let records = state
    .store
    .list_records(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

/// `GET /people/:id/offerings/:offering_id/summary`
pub async fn summary<S, R>(
  State(state): State<AppState<S, R>>,
  Path((person_id, offering_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AttendanceSummary>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let summary = state
    .store
    .attendance_summary(person_id, offering_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(summary))
}
