//! Router tests against an in-memory store and a canned recognizer.

use std::{future::Future, sync::Arc};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use rollcall_core::{
  DetectionError, Embedding, matcher::Threshold, recognizer::FaceRecognizer,
};
use rollcall_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, api_router};

struct StubRecognizer(Result<Embedding, DetectionError>);

impl FaceRecognizer for StubRecognizer {
  fn detect_and_embed<'a>(
    &'a self,
    _image: &'a [u8],
  ) -> impl Future<Output = Result<Embedding, DetectionError>> + Send + 'a {
    std::future::ready(self.0.clone())
  }
}

async fn app_with(detection: Result<Embedding, DetectionError>) -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  api_router(AppState {
    store:      Arc::new(store),
    recognizer: Arc::new(StubRecognizer(detection)),
    threshold:  Threshold::default(),
  })
}

async fn app() -> Router { app_with(Ok(Embedding::new(vec![1.0, 0.0]))).await }

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn create_person(app: &Router, role: &str, external_id: &str) -> String {
  let (status, body) = send(
    app,
    "POST",
    "/people",
    Some(json!({ "role": role, "external_id": external_id, "full_name": external_id })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["person_id"].as_str().unwrap().to_string()
}

/// A teacher, an offering and one enrolled student; returns
/// `(offering_id, student_id)`.
async fn class(app: &Router) -> (String, String) {
  let teacher = create_person(app, "teacher", "T-001").await;
  let (status, offering) = send(
    app,
    "POST",
    "/offerings",
    Some(json!({
      "course_code": "CS101",
      "course_name": "Intro to Computing",
      "teacher_id":  teacher,
      "term":        "2026-fall",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{offering}");
  let offering_id = offering["offering_id"].as_str().unwrap().to_string();

  let student = create_person(app, "student", "S-001").await;
  let (status, _) = send(
    app,
    "POST",
    &format!("/offerings/{offering_id}/cohort"),
    Some(json!({ "person_id": student })),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  (offering_id, student)
}

fn image() -> String { format!("data:image/jpeg;base64,{}", B64.encode(b"jpeg bytes")) }

// ─── People ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn person_lifecycle() {
  let app = app().await;
  let id = create_person(&app, "student", "S-001").await;

  let (status, body) = send(&app, "GET", &format!("/people/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["external_id"], "S-001");
  assert_eq!(body["role"], "student");

  let (status, body) = send(
    &app,
    "POST",
    "/people",
    Some(json!({ "role": "student", "external_id": "S-001", "full_name": "Dup" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());

  let (status, _) = send(&app, "GET", &format!("/people/{}", Uuid::new_v4()), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn credentials_bind_and_verify() {
  let app = app().await;
  let id = create_person(&app, "teacher", "T-001").await;

  let (status, body) = send(
    &app,
    "POST",
    &format!("/people/{id}/credentials"),
    Some(json!({ "role": "teacher", "login": "ada", "password": "s3cret" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert!(body.get("password_hash").is_none());

  let (status, body) = send(
    &app,
    "POST",
    "/credentials/verify",
    Some(json!({ "login": "ada", "password": "s3cret" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["person_id"], id.as_str());
  assert_eq!(body["role"], "teacher");

  let (status, _) = send(
    &app,
    "POST",
    "/credentials/verify",
    Some(json!({ "login": "ada", "password": "wrong" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = send(
    &app,
    "POST",
    "/credentials/verify",
    Some(json!({ "login": "nobody", "password": "s3cret" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn change_password_requires_the_current_one() {
  let app = app().await;
  let id = create_person(&app, "teacher", "T-001").await;
  send(
    &app,
    "POST",
    &format!("/people/{id}/credentials"),
    Some(json!({ "role": "teacher", "login": "ada", "password": "first-pass" })),
  )
  .await;

  let change = |current: &str, new: &str| {
    json!({ "login": "ada", "current_password": current, "new_password": new })
  };

  let (status, _) = send(
    &app,
    "POST",
    "/credentials/change-password",
    Some(change("wrong-pass", "second-pass")),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = send(
    &app,
    "POST",
    "/credentials/change-password",
    Some(change("first-pass", "short")),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(
    &app,
    "POST",
    "/credentials/change-password",
    Some(change("first-pass", "second-pass")),
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (status, _) = send(
    &app,
    "POST",
    "/credentials/verify",
    Some(json!({ "login": "ada", "password": "first-pass" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  let (status, _) = send(
    &app,
    "POST",
    "/credentials/verify",
    Some(json!({ "login": "ada", "password": "second-pass" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn people_listing_and_dashboard() {
  let app = app().await;
  class(&app).await;
  create_person(&app, "admin", "A-001").await;

  let (status, teachers) = send(&app, "GET", "/people?role=teacher", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(teachers.as_array().unwrap().len(), 1);
  assert_eq!(teachers[0]["external_id"], "T-001");

  let (_, everyone) = send(&app, "GET", "/people", None).await;
  assert_eq!(everyone.as_array().unwrap().len(), 3);

  let (status, counts) = send(&app, "GET", "/dashboard", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(counts["people"], 3);
  assert_eq!(counts["students"], 1);
  assert_eq!(counts["offerings"], 1);
  assert_eq!(counts["active_sessions"], 0);
}

#[tokio::test]
async fn person_views_cover_offerings_attendance_and_records() {
  let app = app().await;
  let (offering_id, student) = class(&app).await;

  let (_, started) = send(&app, "POST", &format!("/offerings/{offering_id}/sessions"), None).await;
  let session_id = started["session"]["session_id"].as_str().unwrap().to_string();
  let (status, _) = send(
    &app,
    "POST",
    &format!("/sessions/{session_id}/detections"),
    Some(json!({ "person_identifier": "S-001" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, offerings) = send(&app, "GET", &format!("/people/{student}/offerings"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(offerings[0]["offering_id"], offering_id.as_str());

  let (_, attendance) = send(&app, "GET", &format!("/people/{student}/attendance"), None).await;
  assert_eq!(attendance.as_array().unwrap().len(), 1);
  assert_eq!(attendance[0]["offering"]["course_code"], "CS101");
  assert_eq!(attendance[0]["summary"]["percentage"], 100.0);

  let (_, records) = send(&app, "GET", &format!("/people/{student}/records?limit=5"), None).await;
  assert_eq!(records.as_array().unwrap().len(), 1);
  assert_eq!(records[0]["session_id"], session_id.as_str());

  let (status, _) = send(&app, "GET", &format!("/people/{}/records", Uuid::new_v4()), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cohort_admits_students_only() {
  let app = app().await;
  let (offering_id, _) = class(&app).await;
  let admin = create_person(&app, "admin", "A-001").await;
  create_person(&app, "student", "S-OTHER").await;

  let (status, _) = send(
    &app,
    "POST",
    &format!("/offerings/{offering_id}/cohort"),
    Some(json!({ "person_id": admin })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (_, started) = send(&app, "POST", &format!("/offerings/{offering_id}/sessions"), None).await;
  let session_id = started["session"]["session_id"].as_str().unwrap();
  let (status, _) = send(
    &app,
    "POST",
    &format!("/sessions/{session_id}/detections"),
    Some(json!({ "person_identifier": "S-OTHER" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn capture_then_review() {
  let app = app().await;
  let (_, student) = class(&app).await;
  let face = format!("/people/{student}/face");

  let (status, body) = send(&app, "POST", &face, Some(json!({ "images": [image()] }))).await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["status"], "enrolled");

  let (status, body) = send(&app, "POST", &face, Some(json!({ "images": [image()] }))).await;
  assert_eq!(status, StatusCode::ACCEPTED, "{body}");
  let request_id = body["request_id"].as_str().unwrap().to_string();

  let (_, status_body) = send(&app, "GET", &face, None).await;
  assert_eq!(status_body["enrolled"], true);
  assert_eq!(status_body["pending"], true);

  let (status, pending) = send(&app, "GET", "/enrollment-requests", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(pending.as_array().unwrap().len(), 1);

  let preview = app
    .clone()
    .oneshot(
      Request::builder()
        .uri(format!("/enrollment-requests/{request_id}/preview"))
        .body(Body::empty())
        .unwrap(),
    )
    .await
    .unwrap();
  assert_eq!(preview.status(), StatusCode::OK);
  let bytes = axum::body::to_bytes(preview.into_body(), usize::MAX).await.unwrap();
  assert_eq!(&bytes[..], b"jpeg bytes");

  let approve = format!("/enrollment-requests/{request_id}/approve");
  let (status, body) = send(&app, "POST", &approve, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "approved");

  let (status, _) = send(&app, "POST", &approve, None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  let (status, _) = send(
    &app,
    "POST",
    &format!("/enrollment-requests/{}/reject", Uuid::new_v4()),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn capture_without_face_is_unprocessable() {
  let app = app_with(Err(DetectionError::NoFaceFound)).await;
  let (_, student) = class(&app).await;

  let (status, body) = send(
    &app,
    "POST",
    &format!("/people/{student}/face"),
    Some(json!({ "images": [image()] })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert!(body["error"].as_str().unwrap().contains("no face"));

  let (status, body) = send(
    &app,
    "POST",
    &format!("/people/{student}/face"),
    Some(json!({ "images": [] })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_flow_with_verification() {
  let app = app().await;
  let (offering_id, student) = class(&app).await;
  send(
    &app,
    "POST",
    &format!("/people/{student}/face"),
    Some(json!({ "images": [image(), image()] })),
  )
  .await;

  let sessions = format!("/offerings/{offering_id}/sessions");
  let (status, started) = send(&app, "POST", &sessions, None).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(started["resumed"], false);
  assert_eq!(started["session"]["session_number"], 1);
  let session_id = started["session"]["session_id"].as_str().unwrap().to_string();

  let (status, resumed) = send(&app, "POST", &sessions, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(resumed["resumed"], true);
  assert_eq!(resumed["session"]["session_id"], session_id.as_str());

  let (status, verified) = send(
    &app,
    "POST",
    &format!("/sessions/{session_id}/verify"),
    Some(json!({ "image": image() })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{verified}");
  assert_eq!(verified["matched"], true);
  assert_eq!(verified["person"]["external_id"], "S-001");
  assert_eq!(verified["message"], "Attendance logged via face verification.");

  let (_, records) = send(&app, "GET", &format!("/offerings/{offering_id}/records"), None).await;
  assert_eq!(records.as_array().unwrap().len(), 1);

  let (status, closed) = send(&app, "POST", &format!("/sessions/{session_id}/close"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(closed["active"], false);

  let (status, _) = send(&app, "GET", &format!("{sessions}/active"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(
    &app,
    "POST",
    &format!("/sessions/{session_id}/detections"),
    Some(json!({ "person_identifier": "S-001" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, summary) = send(
    &app,
    "GET",
    &format!("/people/{student}/offerings/{offering_id}/summary"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(summary["presents"], 1);
  assert_eq!(summary["totals"], 1);
  assert_eq!(summary["percentage"], 100.0);
}

#[tokio::test]
async fn verify_rejects_undecodable_image() {
  let app = app().await;
  let (offering_id, _) = class(&app).await;
  let (_, started) = send(&app, "POST", &format!("/offerings/{offering_id}/sessions"), None).await;
  let session_id = started["session"]["session_id"].as_str().unwrap();

  let (status, _) = send(
    &app,
    "POST",
    &format!("/sessions/{session_id}/verify"),
    Some(json!({ "image": "%%%" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn inactive_offering_refuses_sessions() {
  let app = app().await;
  let (offering_id, student) = class(&app).await;

  let (status, body) = send(
    &app,
    "PUT",
    &format!("/offerings/{offering_id}/active"),
    Some(json!({ "active": false })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["active"], false);

  let (status, _) = send(&app, "POST", &format!("/offerings/{offering_id}/sessions"), None).await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, roster) = send(&app, "GET", &format!("/offerings/{offering_id}/roster"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(roster[0]["person"]["person_id"], student.as_str());
  assert_eq!(roster[0]["summary"]["percentage"], 0.0);

  let (status, _) = send(&app, "DELETE", &format!("/offerings/{offering_id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&app, "GET", &format!("/offerings/{offering_id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
