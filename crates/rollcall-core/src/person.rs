//! People and the credentials bound to them.
//!
//! Every person carries exactly one [`Role`]. Login material for every role
//! lives in a single [`Credential`] shape keyed by `(person, role)` rather than
//! in per-role record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a person is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Teacher,
  Student,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Admin => "admin",
      Self::Teacher => "teacher",
      Self::Student => "student",
    }
  }
}

impl std::fmt::Display for Role {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub person_id:   Uuid,
  pub role:        Role,
  /// Institution-issued identifier (roll number, staff id). Unique.
  pub external_id: String,
  pub full_name:   String,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::add_person`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPerson {
  pub role:        Role,
  pub external_id: String,
  pub full_name:   String,
}

/// Login material for one person acting in one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
  pub person_id:     Uuid,
  pub role:          Role,
  /// Unique login name, typically an email address.
  pub login:         String,
  /// PHC string, e.g. `$argon2id$v=19$…`. Never serialised outward.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub last_login_at: Option<DateTime<Utc>>,
}
