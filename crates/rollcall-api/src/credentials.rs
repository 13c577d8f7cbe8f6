//! Login material: argon2-hashed passwords bound to `(person, role)`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/people/:id/credentials` | Body: `{"role":"teacher","login":"…","password":"…"}` |
//! | `POST` | `/credentials/verify` | Body: `{"login":"…","password":"…"}`; 401 on mismatch |
//! | `POST` | `/credentials/change-password` | Body: `{"login":"…","current_password":"…","new_password":"…"}` |

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rand_core::OsRng;
use rollcall_core::{person::Role, recognizer::FaceRecognizer, store::AttendanceStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// Shortest password accepted when changing one.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Produce a PHC string (`$argon2id$v=19$…`) for `password`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Store(format!("argon2 error: {e}").into()))
}

/// Check `password` against a stored PHC string. A malformed hash never
/// verifies.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .map(|parsed| {
      Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
    })
    .unwrap_or(false)
}

// ─── Bind ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BindBody {
  pub role:     Role,
  pub login:    String,
  pub password: String,
}

/// `POST /people/:id/credentials`: create or replace the login for a role.
pub async fn bind<S, R>(
  State(state): State<AppState<S, R>>,
  Path(id): Path<Uuid>,
  Json(body): Json<BindBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let login = body.login.trim().to_string();
  if login.is_empty() || body.password.is_empty() {
    return Err(ApiError::BadRequest("login and password are required".into()));
  }

  let hash = hash_password(&body.password)?;
  let credential = state
    .store
    .bind_credential(id, body.role, login, hash)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(credential)))
}

// ─── Verify ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub login:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct VerifiedLogin {
  pub person_id: Uuid,
  pub role:      Role,
}

/// `POST /credentials/verify`
///
/// Unknown logins and wrong passwords are indistinguishable to the caller.
pub async fn verify<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<VerifyBody>,
) -> Result<Json<VerifiedLogin>, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let credential = state
    .store
    .find_credential(body.login.trim().to_string())
    .await
    .map_err(ApiError::from_store)?
    .ok_or(ApiError::Unauthorized)?;

  if !verify_password(&body.password, &credential.password_hash) {
    tracing::debug!(login = %credential.login, "password rejected");
    return Err(ApiError::Unauthorized);
  }

  state
    .store
    .touch_credential(credential.person_id, credential.role)
    .await
    .map_err(ApiError::from_store)?;

  Ok(Json(VerifiedLogin {
    person_id: credential.person_id,
    role:      credential.role,
  }))
}

// ─── Change password ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
  pub login:            String,
  pub current_password: String,
  pub new_password:     String,
}

/// `POST /credentials/change-password`
///
/// 401 if the current password does not verify; 400 if the new one is shorter
/// than [`MIN_PASSWORD_LEN`].
pub async fn change_password<S, R>(
  State(state): State<AppState<S, R>>,
  Json(body): Json<ChangePasswordBody>,
) -> Result<StatusCode, ApiError>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  if body.new_password.chars().count() < MIN_PASSWORD_LEN {
    return Err(ApiError::BadRequest(format!(
      "new password must be at least {MIN_PASSWORD_LEN} characters"
    )));
  }

  let credential = state
    .store
    .find_credential(body.login.trim().to_string())
    .await
    .map_err(ApiError::from_store)?
    .ok_or(ApiError::Unauthorized)?;
  if !verify_password(&body.current_password, &credential.password_hash) {
    return Err(ApiError::Unauthorized);
  }

  let new_hash = hash_password(&body.new_password)?;
  state
    .store
    .replace_password_hash(
      credential.person_id,
      credential.role,
      credential.password_hash,
      new_hash,
    )
    .await
    .map_err(ApiError::from_store)?;

  tracing::info!(person_id = %credential.person_id, role = %credential.role, "password changed");
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_then_verify() {
    let hash = hash_password("hunter2").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("hunter2", &hash));
    assert!(!verify_password("hunter3", &hash));
  }

  #[test]
  fn malformed_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
  }
}
