//! Offerings: a course taught by one teacher to a cohort of students.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
  pub offering_id: Uuid,
  pub course_code: String,
  pub course_name: String,
  /// The teaching [`Person`](crate::person::Person).
  pub teacher_id:  Uuid,
  pub term:        String,
  pub room:        Option<String>,
  /// Deactivated offerings keep their history but cannot start sessions.
  pub active:      bool,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::AttendanceStore::add_offering`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewOffering {
  pub course_code: String,
  pub course_name: String,
  pub teacher_id:  Uuid,
  pub term:        String,
  pub room:        Option<String>,
}
