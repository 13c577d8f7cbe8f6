//! JSON REST API for Rollcall.
//!
//! Exposes an axum [`Router`] backed by any [`AttendanceStore`] and
//! [`FaceRecognizer`]. TLS and session tokens are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rollcall_api::api_router(state))
//! ```

pub mod credentials;
pub mod error;
pub mod faces;
pub mod image;
pub mod offerings;
pub mod people;
pub mod requests;
pub mod sessions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use rollcall_core::{
  matcher::Threshold, recognizer::FaceRecognizer, store::AttendanceStore,
};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, R> {
  pub store:      Arc<S>,
  /// Built once at startup and shared by every request.
  pub recognizer: Arc<R>,
  pub threshold:  Threshold,
}

// Derived `Clone` would demand `S: Clone` and `R: Clone`.
impl<S, R> Clone for AppState<S, R> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      recognizer: Arc::clone(&self.recognizer),
      threshold:  self.threshold,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, R>(state: AppState<S, R>) -> Router<()>
where
  S: AttendanceStore + 'static,
  R: FaceRecognizer + 'static,
{
  Router::new()
    // People
    .route("/people", get(people::list::<S, R>).post(people::create::<S, R>))
    .route("/people/{id}", get(people::get_one::<S, R>))
    .route("/people/{id}/offerings", get(people::offerings::<S, R>))
    .route("/people/{id}/attendance", get(people::attendance::<S, R>))
    .route("/people/{id}/records", get(people::records::<S, R>))
    .route("/dashboard", get(people::dashboard::<S, R>))
    .route("/people/{id}/credentials", post(credentials::bind::<S, R>))
    .route("/credentials/verify", post(credentials::verify::<S, R>))
    .route("/credentials/change-password", post(credentials::change_password::<S, R>))
    .route("/people/{id}/face", get(faces::status::<S, R>).post(faces::capture::<S, R>))
    .route(
      "/people/{id}/offerings/{offering_id}/summary",
      get(offerings::summary::<S, R>),
    )
    // Offerings
    .route("/offerings", post(offerings::create::<S, R>))
    .route(
      "/offerings/{id}",
      get(offerings::get_one::<S, R>).delete(offerings::delete_one::<S, R>),
    )
    .route("/offerings/{id}/active", put(offerings::set_active::<S, R>))
    .route("/offerings/{id}/cohort", post(offerings::enroll::<S, R>))
    .route("/offerings/{id}/roster", get(offerings::roster::<S, R>))
    .route("/offerings/{id}/records", get(offerings::records::<S, R>))
    // Sessions
    .route(
      "/offerings/{id}/sessions",
      get(sessions::list::<S, R>).post(sessions::start::<S, R>),
    )
    .route("/offerings/{id}/sessions/active", get(sessions::active::<S, R>))
    .route("/sessions/{id}", get(sessions::get_one::<S, R>))
    .route("/sessions/{id}/close", post(sessions::close::<S, R>))
    .route("/sessions/{id}/detections", post(sessions::record::<S, R>))
    .route("/sessions/{id}/verify", post(sessions::verify::<S, R>))
    // Enrollment requests
    .route("/enrollment-requests", get(requests::list::<S, R>))
    .route("/enrollment-requests/{id}/preview", get(requests::preview::<S, R>))
    .route("/enrollment-requests/{id}/approve", post(requests::approve::<S, R>))
    .route("/enrollment-requests/{id}/reject", post(requests::reject::<S, R>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
