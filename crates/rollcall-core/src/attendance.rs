//! Attendance sessions, records, and the summaries derived from them.
//!
//! A session moves `active → closed` exactly once and never back. At most one
//! session per offering is active at a time; the store enforces this together
//! with per-offering `session_number` allocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{offering::Offering, person::Person};

// ─── Sessions ────────────────────────────────────────────────────────────────

/// Lifecycle state of a session, derived from its `active` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
  Active,
  Closed,
}

/// One meeting of an [`Offering`](crate::offering::Offering).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSession {
  pub session_id:     Uuid,
  pub offering_id:    Uuid,
  /// 1-based and strictly increasing per offering.
  pub session_number: u32,
  pub start_time:     DateTime<Utc>,
  /// Set exactly once, when the session is closed.
  pub end_time:       Option<DateTime<Utc>>,
  pub active:         bool,
}

impl AttendanceSession {
  pub fn state(&self) -> SessionState {
    if self.active { SessionState::Active } else { SessionState::Closed }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
  #[default]
  Present,
  Absent,
  Excused,
}

impl AttendanceStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Present => "present",
      Self::Absent => "absent",
      Self::Excused => "excused",
    }
  }
}

/// Presence of one person in one session. Unique per `(session_id, person_id)`;
/// repeated detections update `detected_at` and `confidence` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub record_id:   Uuid,
  pub session_id:  Uuid,
  pub person_id:   Uuid,
  pub detected_at: DateTime<Utc>,
  pub status:      AttendanceStatus,
  pub confidence:  Option<f32>,
}

// ─── Summaries ───────────────────────────────────────────────────────────────

/// Attendance of one person across every session of one offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSummary {
  pub person_id:   Uuid,
  pub offering_id: Uuid,
  /// Sessions with a `present` record for this person.
  pub presents:    u32,
  /// All sessions of the offering, open or closed.
  pub totals:      u32,
  pub percentage:  f64,
}

impl AttendanceSummary {
  pub fn new(person_id: Uuid, offering_id: Uuid, presents: u32, totals: u32) -> Self {
    Self {
      person_id,
      offering_id,
      presents,
      totals,
      percentage: percentage(presents, totals),
    }
  }
}

/// `presents / totals × 100`, rounded to two decimals. No sessions is 0%.
pub fn percentage(presents: u32, totals: u32) -> f64 {
  if totals == 0 {
    return 0.0;
  }
  let raw = f64::from(presents) / f64::from(totals) * 100.0;
  (raw * 100.0).round() / 100.0
}

/// A cohort member together with their attendance in the offering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
  pub person:  Person,
  pub summary: AttendanceSummary,
}

/// One offering a student belongs to, with their attendance in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseAttendance {
  pub offering: Offering,
  pub summary:  AttendanceSummary,
}

/// Institution-wide counts for the administrator overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dashboard {
  pub people:           u32,
  pub teachers:         u32,
  pub students:         u32,
  pub offerings:        u32,
  pub active_sessions:  u32,
  pub pending_requests: u32,
}
