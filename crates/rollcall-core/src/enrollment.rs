//! Enrolled face identities and the approval queue guarding their updates.
//!
//! A person's first capture is enrolled immediately. Every later capture is
//! queued as an [`EnrollmentRequest`] and only replaces the live identity once
//! an admin approves it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Identity ────────────────────────────────────────────────────────────────

/// The live reference embedding(s) for one person. Zero or one per person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceIdentity {
  pub person_id:    Uuid,
  /// Codec token holding up to three raw samples; see
  /// [`crate::embedding::encode`].
  pub token:        String,
  pub sample_count: u32,
  pub captured_at:  DateTime<Utc>,
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// `Pending → Approved | Rejected`; both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
  Pending,
  Approved,
  Rejected,
}

impl RequestStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Approved => "approved",
      Self::Rejected => "rejected",
    }
  }
}

/// A proposed replacement for a person's [`FaceIdentity`]. At most one is
/// pending per person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRequest {
  pub request_id:    Uuid,
  pub person_id:     Uuid,
  pub token:         String,
  /// One captured image for human review; served separately as raw bytes.
  #[serde(skip)]
  pub preview_image: Vec<u8>,
  pub status:        RequestStatus,
  pub created_at:    DateTime<Utc>,
  pub decided_at:    Option<DateTime<Utc>>,
}

// ─── Capture results ─────────────────────────────────────────────────────────

/// What a capture did with the submitted samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureOutcome {
  /// First enrollment; live immediately.
  Enrolled { samples: u32 },
  /// Re-enrollment; waits for an admin decision.
  Queued { request_id: Uuid },
}

/// Enrollment progress for one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentStatus {
  pub enrolled: bool,
  pub samples:  u32,
  /// All [`MAX_SAMPLES`](crate::embedding::MAX_SAMPLES) samples captured.
  pub complete: bool,
  pub pending:  bool,
}
