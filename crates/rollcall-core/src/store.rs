//! The `AttendanceStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `rollcall-store-sqlite`).
//! Higher layers (`rollcall-api`, the pipeline in this crate) depend on this
//! abstraction, not on any concrete backend.
//!
//! Backends own the check-then-write steps behind every invariant: one active
//! session per offering, one record per `(session, person)`, one pending
//! enrollment request per person. Each must hold under concurrent callers.

use std::future::Future;

use uuid::Uuid;

use crate::{
  attendance::{
    AttendanceRecord, AttendanceSession, AttendanceSummary, CourseAttendance, Dashboard,
    RosterEntry,
  },
  embedding::Embedding,
  enrollment::{CaptureOutcome, EnrollmentRequest, FaceIdentity},
  error::DomainError,
  offering::{NewOffering, Offering},
  person::{Credential, NewPerson, Person, Role},
};

/// Abstraction over an attendance store backend.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait AttendanceStore: Send + Sync {
  type Error: std::error::Error + DomainError + From<crate::Error> + Send + Sync + 'static;

  // ── People ────────────────────────────────────────────────────────────

  /// Persist a new person. `Conflict` if the external id is taken.
  fn add_person(
    &self,
    input: NewPerson,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  fn get_person(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// Resolve a person by their institution-issued identifier.
  fn find_person(
    &self,
    external_id: String,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// People holding `role`, or everyone when `None`, oldest first.
  fn list_people(
    &self,
    role: Option<Role>,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Bind (or rebind) login material to `(person, role)`.
  ///
  /// `InvalidState` if the person does not hold `role`; `Conflict` if the
  /// login is bound to someone else.
  fn bind_credential(
    &self,
    person_id: Uuid,
    role: Role,
    login: String,
    password_hash: String,
  ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + '_;

  fn find_credential(
    &self,
    login: String,
  ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + '_;

  /// Stamp `last_login_at` with the current time.
  fn touch_credential(
    &self,
    person_id: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Swap the password hash of `(person, role)` if it still equals
  /// `current_hash`.
  ///
  /// `NotFound` if there is no such credential; `Conflict` if the hash changed
  /// since the caller verified it.
  fn replace_password_hash(
    &self,
    person_id: Uuid,
    role: Role,
    current_hash: String,
    new_hash: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Offerings ─────────────────────────────────────────────────────────

  /// `NotFound` if the teacher is unknown; `InvalidState` if they are not a
  /// teacher.
  fn add_offering(
    &self,
    input: NewOffering,
  ) -> impl Future<Output = Result<Offering, Self::Error>> + Send + '_;

  fn get_offering(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Offering>, Self::Error>> + Send + '_;

  fn set_offering_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Offering, Self::Error>> + Send + '_;

  /// Add a student to an offering's cohort. Enrolling twice is a no-op.
  ///
  /// `InvalidState` if the person is not a student.
  fn enroll_in_offering(
    &self,
    offering_id: Uuid,
    person_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Cohort members in enrollment order.
  fn cohort(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  /// Offerings a person takes part in: the ones a teacher teaches, or the
  /// ones a student is enrolled in (in enrollment order).
  fn offerings_for_person(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Offering>, Self::Error>> + Send + '_;

  /// Delete an offering together with its cohort, sessions and records in a
  /// single transaction.
  fn delete_offering(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Open the next session of an offering.
  ///
  /// `Conflict` if one is already active; callers wanting idempotence should
  /// use [`crate::pipeline::start_or_resume`].
  fn start_session(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<AttendanceSession, Self::Error>> + Send + '_;

  /// Close a session. Closing a closed session returns it unchanged.
  fn close_session(
    &self,
    session_id: Uuid,
  ) -> impl Future<Output = Result<AttendanceSession, Self::Error>> + Send + '_;

  fn get_session(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceSession>, Self::Error>> + Send + '_;

  fn active_session(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<Option<AttendanceSession>, Self::Error>> + Send + '_;

  /// Sessions of an offering ordered by `session_number`.
  fn list_sessions(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceSession>, Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  /// Mark `person_identifier` present in an active session, updating the
  /// existing record if there is one.
  ///
  /// `NotFound` unless the identifier names a student in the session's cohort.
  fn record_detection(
    &self,
    session_id: Uuid,
    person_identifier: String,
    confidence: Option<f32>,
  ) -> impl Future<Output = Result<AttendanceRecord, Self::Error>> + Send + '_;

  /// Every record of an offering, most recent detection first.
  fn list_records(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  fn attendance_summary(
    &self,
    person_id: Uuid,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<AttendanceSummary, Self::Error>> + Send + '_;

  /// The student's attendance in every offering they are enrolled in, in
  /// enrollment order.
  fn person_summaries(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CourseAttendance>, Self::Error>> + Send + '_;

  /// A person's latest `limit` records across all offerings, newest first.
  fn recent_records(
    &self,
    person_id: Uuid,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + '_;

  fn dashboard(&self) -> impl Future<Output = Result<Dashboard, Self::Error>> + Send + '_;

  /// One summary per cohort member.
  fn roster(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RosterEntry>, Self::Error>> + Send + '_;

  // ── Face identities ───────────────────────────────────────────────────

  fn get_identity(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Option<FaceIdentity>, Self::Error>> + Send + '_;

  /// Cohort members that have an enrolled identity, in enrollment order.
  fn cohort_identities(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<Vec<(Person, FaceIdentity)>, Self::Error>> + Send + '_;

  /// Store a person's first identity, auto-approved.
  ///
  /// `Conflict` if they already have one: replacements go through
  /// [`propose_update`](Self::propose_update).
  fn enroll_first_time(
    &self,
    person_id: Uuid,
    samples: Vec<Embedding>,
  ) -> impl Future<Output = Result<FaceIdentity, Self::Error>> + Send + '_;

  /// Queue a replacement identity for review. `Conflict` if one is pending.
  fn propose_update(
    &self,
    person_id: Uuid,
    samples: Vec<Embedding>,
    preview_image: Vec<u8>,
  ) -> impl Future<Output = Result<EnrollmentRequest, Self::Error>> + Send + '_;

  /// Enroll or queue in one step, deciding atomically which applies.
  fn capture_enrollment(
    &self,
    person_id: Uuid,
    samples: Vec<Embedding>,
    preview_image: Vec<u8>,
  ) -> impl Future<Output = Result<CaptureOutcome, Self::Error>> + Send + '_;

  fn get_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<EnrollmentRequest>, Self::Error>> + Send + '_;

  fn pending_request(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Option<EnrollmentRequest>, Self::Error>> + Send + '_;

  /// Pending requests, oldest first.
  fn list_pending_requests(
    &self,
  ) -> impl Future<Output = Result<Vec<EnrollmentRequest>, Self::Error>> + Send + '_;

  /// Commit a pending request into the person's identity.
  ///
  /// `NotFound` if missing; `InvalidState` if already decided.
  fn approve_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<EnrollmentRequest, Self::Error>> + Send + '_;

  /// Discard a pending request. Same preconditions as
  /// [`approve_request`](Self::approve_request).
  fn reject_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<EnrollmentRequest, Self::Error>> + Send + '_;
}
