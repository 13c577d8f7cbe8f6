//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that lexical
//! order matches chronological order. Enums are stored as their lowercase
//! names. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use rollcall_core::{
  attendance::{AttendanceRecord, AttendanceSession, AttendanceStatus},
  enrollment::{EnrollmentRequest, FaceIdentity, RequestStatus},
  offering::Offering,
  person::{Credential, Person, Role},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "admin" => Ok(Role::Admin),
    "teacher" => Ok(Role::Teacher),
    "student" => Ok(Role::Student),
    other => Err(Error::Decode(format!("unknown role: {other:?}"))),
  }
}

pub fn decode_attendance_status(s: &str) -> Result<AttendanceStatus> {
  match s {
    "present" => Ok(AttendanceStatus::Present),
    "absent" => Ok(AttendanceStatus::Absent),
    "excused" => Ok(AttendanceStatus::Excused),
    other => Err(Error::Decode(format!("unknown attendance status: {other:?}"))),
  }
}

pub fn decode_request_status(s: &str) -> Result<RequestStatus> {
  match s {
    "pending" => Ok(RequestStatus::Pending),
    "approved" => Ok(RequestStatus::Approved),
    "rejected" => Ok(RequestStatus::Rejected),
    other => Err(Error::Decode(format!("unknown request status: {other:?}"))),
  }
}

fn decode_count(n: i64, what: &str) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Decode(format!("{what} out of range: {n}")))
}

/// Prefix every column with a table alias, e.g. `p.person_id, p.role`.
pub fn qualified(alias: &str, columns: &[&str]) -> String {
  columns
    .iter()
    .map(|c| format!("{alias}.{c}"))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `people` row.
pub struct RawPerson {
  pub person_id:   String,
  pub role:        String,
  pub external_id: String,
  pub full_name:   String,
  pub created_at:  String,
}

impl RawPerson {
  pub const COLUMNS: &'static [&'static str] = &["person_id", "role", "external_id", "full_name", "created_at"];

  /// Read from `row` starting at column `at`.
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:   row.get(at)?,
      role:        row.get(at + 1)?,
      external_id: row.get(at + 2)?,
      full_name:   row.get(at + 3)?,
      created_at:  row.get(at + 4)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:   decode_uuid(&self.person_id)?,
      role:        decode_role(&self.role)?,
      external_id: self.external_id,
      full_name:   self.full_name,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `credentials` row.
pub struct RawCredential {
  pub person_id:     String,
  pub role:          String,
  pub login:         String,
  pub password_hash: String,
  pub last_login_at: Option<String>,
}

impl RawCredential {
  pub const COLUMNS: &'static [&'static str] = &["person_id", "role", "login", "password_hash", "last_login_at"];

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:     row.get(0)?,
      role:          row.get(1)?,
      login:         row.get(2)?,
      password_hash: row.get(3)?,
      last_login_at: row.get(4)?,
    })
  }

  pub fn into_credential(self) -> Result<Credential> {
    Ok(Credential {
      person_id:     decode_uuid(&self.person_id)?,
      role:          decode_role(&self.role)?,
      login:         self.login,
      password_hash: self.password_hash,
      last_login_at: decode_opt_dt(self.last_login_at.as_deref())?,
    })
  }
}

/// Raw strings read directly from an `offerings` row.
pub struct RawOffering {
  pub offering_id: String,
  pub course_code: String,
  pub course_name: String,
  pub teacher_id:  String,
  pub term:        String,
  pub room:        Option<String>,
  pub active:      bool,
  pub created_at:  String,
}

impl RawOffering {
  pub const COLUMNS: &'static [&'static str] = &[
    "offering_id",
    "course_code",
    "course_name",
    "teacher_id",
    "term",
    "room",
    "active",
    "created_at",
  ];

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      offering_id: row.get(0)?,
      course_code: row.get(1)?,
      course_name: row.get(2)?,
      teacher_id:  row.get(3)?,
      term:        row.get(4)?,
      room:        row.get(5)?,
      active:      row.get(6)?,
      created_at:  row.get(7)?,
    })
  }

  pub fn into_offering(self) -> Result<Offering> {
    Ok(Offering {
      offering_id: decode_uuid(&self.offering_id)?,
      course_code: self.course_code,
      course_name: self.course_name,
      teacher_id:  decode_uuid(&self.teacher_id)?,
      term:        self.term,
      room:        self.room,
      active:      self.active,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub session_id:     String,
  pub offering_id:    String,
  pub session_number: i64,
  pub start_time:     String,
  pub end_time:       Option<String>,
  pub active:         bool,
}

impl RawSession {
  pub const COLUMNS: &'static [&'static str] = &[
    "session_id",
    "offering_id",
    "session_number",
    "start_time",
    "end_time",
    "active",
  ];

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      session_id:     row.get(0)?,
      offering_id:    row.get(1)?,
      session_number: row.get(2)?,
      start_time:     row.get(3)?,
      end_time:       row.get(4)?,
      active:         row.get(5)?,
    })
  }

  pub fn into_session(self) -> Result<AttendanceSession> {
    Ok(AttendanceSession {
      session_id:     decode_uuid(&self.session_id)?,
      offering_id:    decode_uuid(&self.offering_id)?,
      session_number: decode_count(self.session_number, "session number")?,
      start_time:     decode_dt(&self.start_time)?,
      end_time:       decode_opt_dt(self.end_time.as_deref())?,
      active:         self.active,
    })
  }
}

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub record_id:   String,
  pub session_id:  String,
  pub person_id:   String,
  pub detected_at: String,
  pub status:      String,
  pub confidence:  Option<f64>,
}

impl RawRecord {
  pub const COLUMNS: &'static [&'static str] = &[
    "record_id",
    "session_id",
    "person_id",
    "detected_at",
    "status",
    "confidence",
  ];

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:   row.get(0)?,
      session_id:  row.get(1)?,
      person_id:   row.get(2)?,
      detected_at: row.get(3)?,
      status:      row.get(4)?,
      confidence:  row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      record_id:   decode_uuid(&self.record_id)?,
      session_id:  decode_uuid(&self.session_id)?,
      person_id:   decode_uuid(&self.person_id)?,
      detected_at: decode_dt(&self.detected_at)?,
      status:      decode_attendance_status(&self.status)?,
      confidence:  self.confidence.map(|c| c as f32),
    })
  }
}

/// Raw strings read directly from a `face_identities` row.
pub struct RawIdentity {
  pub person_id:    String,
  pub token:        String,
  pub sample_count: i64,
  pub captured_at:  String,
}

impl RawIdentity {
  pub const COLUMNS: &'static [&'static str] = &["person_id", "token", "sample_count", "captured_at"];

  /// Read from `row` starting at column `at`.
  pub fn from_row(row: &rusqlite::Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:    row.get(at)?,
      token:        row.get(at + 1)?,
      sample_count: row.get(at + 2)?,
      captured_at:  row.get(at + 3)?,
    })
  }

  pub fn into_identity(self) -> Result<FaceIdentity> {
    Ok(FaceIdentity {
      person_id:    decode_uuid(&self.person_id)?,
      token:        self.token,
      sample_count: decode_count(self.sample_count, "sample count")?,
      captured_at:  decode_dt(&self.captured_at)?,
    })
  }
}

/// Raw strings read directly from an `enrollment_requests` row.
pub struct RawRequest {
  pub request_id:    String,
  pub person_id:     String,
  pub token:         String,
  pub preview_image: Vec<u8>,
  pub status:        String,
  pub created_at:    String,
  pub decided_at:    Option<String>,
}

impl RawRequest {
  pub const COLUMNS: &'static [&'static str] = &[
    "request_id",
    "person_id",
    "token",
    "preview_image",
    "status",
    "created_at",
    "decided_at",
  ];

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:    row.get(0)?,
      person_id:     row.get(1)?,
      token:         row.get(2)?,
      preview_image: row.get(3)?,
      status:        row.get(4)?,
      created_at:    row.get(5)?,
      decided_at:    row.get(6)?,
    })
  }

  pub fn into_request(self) -> Result<EnrollmentRequest> {
    Ok(EnrollmentRequest {
      request_id:    decode_uuid(&self.request_id)?,
      person_id:     decode_uuid(&self.person_id)?,
      token:         self.token,
      preview_image: self.preview_image,
      status:        decode_request_status(&self.status)?,
      created_at:    decode_dt(&self.created_at)?,
      decided_at:    decode_opt_dt(self.decided_at.as_deref())?,
    })
  }
}
