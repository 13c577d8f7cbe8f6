//! Handlers for `/people` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/people` | Body: `{"role":"student","external_id":"S-001","full_name":"…"}` |
//! | `GET`  | `/people` | Optional `?role=teacher` filter |
//! | `GET`  | `/people/:id` | 404 if not found |
//! | `GET`  | `/people/:id/offerings` | Taught or enrolled offerings |
//! | `GET`  | `/people/:id/attendance` | One summary per enrolled offering |
//! | `GET`  | `/people/:id/records` | Newest first; `?limit=` defaults to 25 |
//! | `GET`  | `/dashboard` | Institution-wide counts |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  attendance::{AttendanceRecord, CourseAttendance, Dashboard},
  offering::Offering,
  person::{NewPerson, Person, Role},
  recognizer::FaceRecognizer,
  store::AttendanceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /people`: 409 if the external id is taken.
pub async fn create<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<NewPerson>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let person = state
    .store
    .add_person(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(person)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
  pub role: Option<Role>,
}

/// `GET /people`
pub async fn list<S, R>(
  State(state): State<AppState<S, R>>,
  Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Person>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let people = state
    .store
    .list_people(query.role)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(people))
}

/// `GET /dashboard`
pub async fn dashboard<S, R>(
  State(state): State<AppState<S, R>>,
) -> Result<Json<Dashboard>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let counts = state.store.dashboard().await.map_err(ApiError::from_store)?;
  Ok(Json(counts))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /people/:id`
pub async fn get_one<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Person>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let person = state
    .store
    .get_person(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("person {id} not found")))?;
  Ok(Json(person))
}

// ─── Per-person views ─────────────────────────────────────────────────────────

/// `GET /people/:id/offerings`
pub async fn offerings<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Offering>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let offerings = state
    .store
    .offerings_for_person(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(offerings))
}

/// `GET /people/:id/attendance`
pub async fn attendance<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<CourseAttendance>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let summaries = state
    .store
    .person_summaries(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(summaries))
}

const DEFAULT_RECENT: u32 = 25;
const MAX_RECENT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
  pub limit: Option<u32>,
}

/// `GET /people/:id/records`
pub async fn records<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let limit = query.limit.unwrap_or(DEFAULT_RECENT).min(MAX_RECENT);
  let records = state
    .store
    .recent_records(id, limit)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}
