//! End-to-end flows composed from the recognizer, codec, matcher and store.
//!
//! None of these write anything until the recognizer has produced every
//! vector it was asked for, so a failed detection leaves no partial state.

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error,
  attendance::{AttendanceRecord, AttendanceSession, SessionState},
  embedding::{self, Embedding, MAX_SAMPLES},
  enrollment::{CaptureOutcome, EnrollmentStatus},
  error::DomainError,
  matcher::{Matcher, CosineMatcher, Threshold},
  person::Person,
  recognizer::FaceRecognizer,
  store::AttendanceStore,
};

// ─── Verification ────────────────────────────────────────────────────────────

/// Outcome of matching a captured face against a session's cohort.
///
/// Both vectors are always returned so thresholds can be audited offline.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
  pub matched:           bool,
  /// The identified person; only set when `matched`.
  pub person:            Option<Person>,
  /// Best similarity found; `None` when nobody in the cohort is enrolled.
  pub confidence:        Option<f32>,
  pub message:           String,
  pub probe:             Embedding,
  /// Aggregated identity of the best candidate, accepted or not.
  pub matched_embedding: Option<Embedding>,
  /// The attendance record written for an accepted match.
  pub record:            Option<AttendanceRecord>,
}

/// Identify the face in `image` among the session's cohort and, when the best
/// candidate clears `threshold`, mark them present.
pub async fn verify<S, R>(
  store: &S,
  recognizer: &R,
  threshold: Threshold,
  session_id: Uuid,
  image: &[u8],
) -> Result<Verification, S::Error>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let session = store
    .get_session(session_id)
    .await?
    .ok_or_else(|| Error::not_found("session", session_id))?;
  // Checked again by the recorder; this only spares the recognizer a call.
  if session.state() == SessionState::Closed {
    return Err(Error::InvalidState(format!("session {session_id} is closed")).into());
  }

  let probe = recognizer.detect_and_embed(image).await.map_err(Error::from)?;

  let mut people = Vec::new();
  let mut candidates = Vec::new();
  for (person, identity) in store.cohort_identities(session.offering_id).await? {
    match embedding::aggregate(&identity.token) {
      Ok(vector) => {
        candidates.push((people.len(), vector));
        people.push(person);
      }
      Err(e) => tracing::warn!(
        person_id = %person.person_id,
        error = %e,
        "skipping unreadable face identity"
      ),
    }
  }

  if candidates.is_empty() {
    return Ok(Verification {
      matched:           false,
      person:            None,
      confidence:        None,
      message:           "No registered faces for this class yet.".into(),
      probe,
      matched_embedding: None,
      record:            None,
    });
  }

  let best = CosineMatcher.best_match(&probe, &candidates);
  let matched_embedding = best.id.map(|idx| candidates[idx].1.clone());

  let accepted = match best.id {
    Some(idx) if threshold.accepts(best.score) => Some(idx),
    _ => None,
  };

  let Some(idx) = accepted else {
    tracing::debug!(
      %session_id,
      score = best.score,
      threshold = threshold.0,
      "face not recognized"
    );
    return Ok(Verification {
      matched: false,
      person: None,
      confidence: Some(best.score),
      message: "Face not recognized. Try again or enroll the student.".into(),
      probe,
      matched_embedding,
      record: None,
    });
  };

  let person = people.swap_remove(idx);
  let rounded = (best.score * 1000.0).round() / 1000.0;
  let record = store
    .record_detection(session_id, person.external_id.clone(), Some(rounded))
    .await?;

  tracing::info!(
    %session_id,
    person_id = %person.person_id,
    score = best.score,
    "attendance logged via face verification"
  );

  Ok(Verification {
    matched: true,
    person: Some(person),
    confidence: Some(best.score),
    message: "Attendance logged via face verification.".into(),
    probe,
    matched_embedding,
    record: Some(record),
  })
}

// ─── Enrollment ──────────────────────────────────────────────────────────────

/// Embed each image and enroll the person, or queue a replacement if they are
/// already enrolled. The first image doubles as the review preview.
pub async fn capture<S, R>(
  store: &S,
  recognizer: &R,
  person_id: Uuid,
  images: &[Vec<u8>],
) -> Result<CaptureOutcome, S::Error>
where
  S: AttendanceStore,
  R: FaceRecognizer,
{
  let Some(preview) = images.first() else {
    return Err(Error::InvalidInput("provide at least one image".into()).into());
  };

  let mut samples = Vec::with_capacity(images.len().min(MAX_SAMPLES));
  for image in images.iter().take(MAX_SAMPLES) {
    samples.push(recognizer.detect_and_embed(image).await.map_err(Error::from)?);
  }

  let outcome = store
    .capture_enrollment(person_id, samples, preview.clone())
    .await?;

  match &outcome {
    CaptureOutcome::Enrolled { samples } => {
      tracing::info!(%person_id, samples, "face enrolled")
    }
    CaptureOutcome::Queued { request_id } => {
      tracing::info!(%person_id, %request_id, "face update queued for approval")
    }
  }

  Ok(outcome)
}

pub async fn enrollment_status<S>(
  store: &S,
  person_id: Uuid,
) -> Result<EnrollmentStatus, S::Error>
where
  S: AttendanceStore,
{
  store
    .get_person(person_id)
    .await?
    .ok_or_else(|| Error::not_found("person", person_id))?;

  let samples = store
    .get_identity(person_id)
    .await?
    .map(|identity| identity.sample_count)
    .unwrap_or(0);
  let pending = store.pending_request(person_id).await?.is_some();

  Ok(EnrollmentStatus {
    enrolled: samples > 0,
    samples,
    complete: samples as usize >= MAX_SAMPLES,
    pending,
  })
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// Result of [`start_or_resume`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionStart {
  pub session: AttendanceSession,
  /// `true` when an already-active session was returned instead.
  pub resumed: bool,
}

/// Start the next session of an offering, or hand back the one already
/// running.
pub async fn start_or_resume<S>(
  store: &S,
  offering_id: Uuid,
) -> Result<SessionStart, S::Error>
where
  S: AttendanceStore,
{
  let conflict = match store.start_session(offering_id).await {
    Ok(session) => return Ok(SessionStart { session, resumed: false }),
    Err(e) if matches!(e.domain(), Some(Error::Conflict(_))) => e,
    Err(e) => return Err(e),
  };

  match store.active_session(offering_id).await? {
    Some(session) => Ok(SessionStart { session, resumed: true }),
    // Closed between the two calls; nothing left to resume.
    None => Err(conflict),
  }
}
