//! [`SqliteStore`]: the SQLite implementation of [`AttendanceStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use uuid::Uuid;

use rollcall_core::{
  Error as CoreError,
  attendance::{
    AttendanceRecord, AttendanceSession, AttendanceSummary, CourseAttendance, Dashboard,
    RosterEntry,
  },
  embedding::{self, Embedding, MAX_SAMPLES},
  enrollment::{CaptureOutcome, EnrollmentRequest, FaceIdentity, RequestStatus},
  offering::{NewOffering, Offering},
  person::{Credential, NewPerson, Person, Role},
  store::AttendanceStore,
};

use crate::{
  Result,
  encode::{
    RawCredential, RawIdentity, RawOffering, RawPerson, RawRecord, RawRequest, RawSession,
    encode_dt, encode_uuid, qualified,
  },
  error::Error,
  schema::SCHEMA,
};

/// A domain outcome decided on the connection thread. Returning it as a value
/// (rather than an error) lets the transaction roll back on drop while the
/// caller still sees the precise reason.
type Outcome<T> = std::result::Result<T, CoreError>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An attendance store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, which serialises every transaction.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Shared body of approve/reject.
  async fn decide_request(&self, id: Uuid, approve: bool) -> Result<EnrollmentRequest> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(Utc::now());
    let status = if approve { RequestStatus::Approved } else { RequestStatus::Rejected };

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<RawRequest>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(request) = query_request(&tx, &id_str)? else {
          return Ok(Err(CoreError::not_found("enrollment request", &id_str)));
        };
        if request.status != RequestStatus::Pending.as_str() {
          return Ok(Err(CoreError::InvalidState(format!(
            "enrollment request {id_str} was already {}",
            request.status
          ))));
        }

        if approve {
          let samples = match embedding::sample_count(&request.token) {
            Ok(n) => n as i64,
            Err(e) => return Ok(Err(e)),
          };
          tx.execute(
            "INSERT INTO face_identities (person_id, token, sample_count, captured_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (person_id) DO UPDATE SET
               token        = excluded.token,
               sample_count = excluded.sample_count,
               captured_at  = excluded.captured_at",
            params![request.person_id, request.token, samples, at_str],
          )?;
        }

        tx.execute(
          "UPDATE enrollment_requests SET status = ?2, decided_at = ?3 WHERE request_id = ?1",
          params![id_str, status.as_str(), at_str],
        )?;

        let decided = fetch_request(&tx, &id_str)?;
        tx.commit()?;
        Ok(Ok(decided))
      })
      .await??;

    let request = raw.into_request()?;
    tracing::debug!(
      request_id = %request.request_id,
      person_id = %request.person_id,
      status = status.as_str(),
      "enrollment request decided"
    );
    Ok(request)
  }
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

fn query_person(conn: &Connection, column: &str, value: &str) -> rusqlite::Result<Option<RawPerson>> {
  conn
    .query_row(
      &format!("SELECT {} FROM people WHERE {column} = ?1", RawPerson::COLUMNS.join(", ")),
      params![value],
      |row| RawPerson::from_row(row, 0),
    )
    .optional()
}

/// A student of `offering_id`'s cohort, by external id.
fn query_cohort_student(
  conn: &Connection,
  offering_id: &str,
  external_id: &str,
) -> rusqlite::Result<Option<RawPerson>> {
  conn
    .query_row(
      &format!(
        "SELECT {}
         FROM people p
         JOIN cohort c ON c.person_id = p.person_id
         WHERE p.external_id = ?1 AND c.offering_id = ?2 AND p.role = 'student'",
        qualified("p", RawPerson::COLUMNS)
      ),
      params![external_id, offering_id],
      |row| RawPerson::from_row(row, 0),
    )
    .optional()
}

fn query_offering(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawOffering>> {
  conn
    .query_row(
      &format!("SELECT {} FROM offerings WHERE offering_id = ?1", RawOffering::COLUMNS.join(", ")),
      params![id],
      RawOffering::from_row,
    )
    .optional()
}

fn query_session(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawSession>> {
  conn
    .query_row(
      &format!("SELECT {} FROM sessions WHERE session_id = ?1", RawSession::COLUMNS.join(", ")),
      params![id],
      RawSession::from_row,
    )
    .optional()
}

fn query_identity(conn: &Connection, person_id: &str) -> rusqlite::Result<Option<RawIdentity>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM face_identities WHERE person_id = ?1",
        RawIdentity::COLUMNS.join(", ")
      ),
      params![person_id],
      |row| RawIdentity::from_row(row, 0),
    )
    .optional()
}

fn query_request(conn: &Connection, id: &str) -> rusqlite::Result<Option<RawRequest>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM enrollment_requests WHERE request_id = ?1",
        RawRequest::COLUMNS.join(", ")
      ),
      params![id],
      RawRequest::from_row,
    )
    .optional()
}

fn fetch_request(conn: &Connection, id: &str) -> rusqlite::Result<RawRequest> {
  query_request(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

fn fetch_session(conn: &Connection, id: &str) -> rusqlite::Result<RawSession> {
  query_session(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

fn pending_request_id(conn: &Connection, person_id: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT request_id FROM enrollment_requests WHERE person_id = ?1 AND status = 'pending'",
      params![person_id],
      |row| row.get(0),
    )
    .optional()
}

fn pending_conflict(person_id: &str) -> CoreError {
  CoreError::Conflict(format!(
    "person {person_id} already has a pending face update request"
  ))
}

fn insert_identity(
  conn: &Connection,
  person_id: &str,
  token: &str,
  sample_count: i64,
  at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO face_identities (person_id, token, sample_count, captured_at)
     VALUES (?1, ?2, ?3, ?4)",
    params![person_id, token, sample_count, at],
  )?;
  Ok(())
}

fn insert_request(
  conn: &Connection,
  request_id: &str,
  person_id: &str,
  token: &str,
  preview_image: &[u8],
  at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO enrollment_requests (request_id, person_id, token, preview_image, status, created_at)
     VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
    params![request_id, person_id, token, preview_image, at],
  )?;
  Ok(())
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── People ────────────────────────────────────────────────────────────────

  async fn add_person(&self, input: NewPerson) -> Result<Person> {
    if input.external_id.trim().is_empty() {
      return Err(CoreError::InvalidInput("external id must not be empty".into()).into());
    }

    let person = Person {
      person_id:   Uuid::new_v4(),
      role:        input.role,
      external_id: input.external_id,
      full_name:   input.full_name,
      created_at:  Utc::now(),
    };

    let id_str      = encode_uuid(person.person_id);
    let role_str    = person.role.as_str();
    let external_id = person.external_id.clone();
    let full_name   = person.full_name.clone();
    let at_str      = encode_dt(person.created_at);

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<()>> {
        match conn.execute(
          "INSERT INTO people (person_id, role, external_id, full_name, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, role_str, external_id, full_name, at_str],
        ) {
          Ok(_) => Ok(Ok(())),
          Err(e) if is_constraint_violation(&e) => Ok(Err(CoreError::Conflict(format!(
            "external id {external_id} is already registered"
          )))),
          Err(e) => Err(e.into()),
        }
      })
      .await??;

    Ok(person)
  }

  async fn get_person(&self, id: Uuid) -> Result<Option<Person>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_person(conn, "person_id", &id_str)?))
      .await?;
    raw.map(RawPerson::into_person).transpose()
  }

  async fn find_person(&self, external_id: String) -> Result<Option<Person>> {
    let raw = self
      .conn
      .call(move |conn| Ok(query_person(conn, "external_id", &external_id)?))
      .await?;
    raw.map(RawPerson::into_person).transpose()
  }

  async fn list_people(&self, role: Option<Role>) -> Result<Vec<Person>> {
    let role_str = role.map(Role::as_str);

    let raws: Vec<RawPerson> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM people
           WHERE ?1 IS NULL OR role = ?1
           ORDER BY created_at, rowid",
          RawPerson::COLUMNS.join(", ")
        ))?;
        let rows = stmt
          .query_map(params![role_str], |row| RawPerson::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn bind_credential(
    &self,
    person_id:     Uuid,
    role:          Role,
    login:         String,
    password_hash: String,
  ) -> Result<Credential> {
    let person_str = encode_uuid(person_id);
    let role_str   = role.as_str();

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<RawCredential>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(person) = query_person(&tx, "person_id", &person_str)? else {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        };
        if person.role != role_str {
          return Ok(Err(CoreError::InvalidState(format!(
            "person {person_str} is a {}, not a {role_str}",
            person.role
          ))));
        }

        match tx.execute(
          "INSERT INTO credentials (person_id, role, login, password_hash, last_login_at)
           VALUES (?1, ?2, ?3, ?4, NULL)
           ON CONFLICT (person_id, role) DO UPDATE SET
             login         = excluded.login,
             password_hash = excluded.password_hash",
          params![person_str, role_str, login, password_hash],
        ) {
          Ok(_) => {}
          Err(e) if is_constraint_violation(&e) => {
            return Ok(Err(CoreError::Conflict(format!("login {login} is already taken"))));
          }
          Err(e) => return Err(e.into()),
        }

        let raw = tx.query_row(
          &format!(
            "SELECT {} FROM credentials WHERE person_id = ?1 AND role = ?2",
            RawCredential::COLUMNS.join(", ")
          ),
          params![person_str, role_str],
          RawCredential::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_credential()
  }

  async fn find_credential(&self, login: String) -> Result<Option<Credential>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM credentials WHERE login = ?1",
                RawCredential::COLUMNS.join(", ")
              ),
              params![login],
              RawCredential::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawCredential::into_credential).transpose()
  }

  async fn touch_credential(&self, person_id: Uuid, role: Role) -> Result<()> {
    let person_str = encode_uuid(person_id);
    let role_str   = role.as_str();
    let at_str     = encode_dt(Utc::now());

    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE credentials SET last_login_at = ?3 WHERE person_id = ?1 AND role = ?2",
          params![person_str, role_str, at_str],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(CoreError::not_found("credential", person_id).into());
    }
    Ok(())
  }

  async fn replace_password_hash(
    &self,
    person_id:    Uuid,
    role:         Role,
    current_hash: String,
    new_hash:     String,
  ) -> Result<()> {
    let person_str = encode_uuid(person_id);
    let role_str   = role.as_str();

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<()>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
          "UPDATE credentials SET password_hash = ?4
           WHERE person_id = ?1 AND role = ?2 AND password_hash = ?3",
          params![person_str, role_str, current_hash, new_hash],
        )?;
        if changed == 0 {
          let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM credentials WHERE person_id = ?1 AND role = ?2)",
            params![person_str, role_str],
            |row| row.get(0),
          )?;
          return Ok(Err(if exists {
            CoreError::Conflict(format!("the {role_str} password of {person_str} changed meanwhile"))
          } else {
            CoreError::not_found("credential", &person_str)
          }));
        }

        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    tracing::debug!(%person_id, role = role.as_str(), "password replaced");
    Ok(())
  }

  // ── Offerings ─────────────────────────────────────────────────────────────

  async fn add_offering(&self, input: NewOffering) -> Result<Offering> {
    let offering = Offering {
      offering_id: Uuid::new_v4(),
      course_code: input.course_code,
      course_name: input.course_name,
      teacher_id:  input.teacher_id,
      term:        input.term,
      room:        input.room,
      active:      true,
      created_at:  Utc::now(),
    };

    let id_str      = encode_uuid(offering.offering_id);
    let teacher_str = encode_uuid(offering.teacher_id);
    let code        = offering.course_code.clone();
    let name        = offering.course_name.clone();
    let term        = offering.term.clone();
    let room        = offering.room.clone();
    let at_str      = encode_dt(offering.created_at);

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<()>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(teacher) = query_person(&tx, "person_id", &teacher_str)? else {
          return Ok(Err(CoreError::not_found("teacher", &teacher_str)));
        };
        if teacher.role != Role::Teacher.as_str() {
          return Ok(Err(CoreError::InvalidState(format!(
            "person {teacher_str} is a {}, not a teacher",
            teacher.role
          ))));
        }

        tx.execute(
          "INSERT INTO offerings (
             offering_id, course_code, course_name, teacher_id, term, room, active, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
          params![id_str, code, name, teacher_str, term, room, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    Ok(offering)
  }

  async fn get_offering(&self, id: Uuid) -> Result<Option<Offering>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_offering(conn, &id_str)?))
      .await?;
    raw.map(RawOffering::into_offering).transpose()
  }

  async fn set_offering_active(&self, id: Uuid, active: bool) -> Result<Offering> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<RawOffering>> {
        conn.execute(
          "UPDATE offerings SET active = ?2 WHERE offering_id = ?1",
          params![id_str, active],
        )?;
        Ok(query_offering(conn, &id_str)?.ok_or_else(|| CoreError::not_found("offering", &id_str)))
      })
      .await??;

    raw.into_offering()
  }

  async fn enroll_in_offering(&self, offering_id: Uuid, person_id: Uuid) -> Result<()> {
    let offering_str = encode_uuid(offering_id);
    let person_str   = encode_uuid(person_id);
    let at_str       = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<()>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if query_offering(&tx, &offering_str)?.is_none() {
          return Ok(Err(CoreError::not_found("offering", &offering_str)));
        }
        let Some(person) = query_person(&tx, "person_id", &person_str)? else {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        };
        if person.role != Role::Student.as_str() {
          return Ok(Err(CoreError::InvalidState(format!(
            "person {person_str} is a {}; only students join a cohort",
            person.role
          ))));
        }

        tx.execute(
          "INSERT OR IGNORE INTO cohort (offering_id, person_id, enrolled_at) VALUES (?1, ?2, ?3)",
          params![offering_str, person_str, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    Ok(())
  }

  async fn cohort(&self, offering_id: Uuid) -> Result<Vec<Person>> {
    let offering_str = encode_uuid(offering_id);

    let raws: Vec<RawPerson> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {}
           FROM cohort c
           JOIN people p ON p.person_id = c.person_id
           WHERE c.offering_id = ?1
           ORDER BY c.enrolled_at, c.rowid",
          qualified("p", RawPerson::COLUMNS)
        ))?;
        let rows = stmt
          .query_map(params![offering_str], |row| RawPerson::from_row(row, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn offerings_for_person(&self, person_id: Uuid) -> Result<Vec<Offering>> {
    let person_str = encode_uuid(person_id);

    let raws = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<Vec<RawOffering>>> {
        let Some(person) = query_person(conn, "person_id", &person_str)? else {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        };

        let sql = if person.role == Role::Teacher.as_str() {
          format!(
            "SELECT {} FROM offerings o WHERE o.teacher_id = ?1 ORDER BY o.created_at, o.rowid",
            qualified("o", RawOffering::COLUMNS)
          )
        } else {
          format!(
            "SELECT {}
             FROM cohort c
             JOIN offerings o ON o.offering_id = c.offering_id
             WHERE c.person_id = ?1
             ORDER BY c.enrolled_at, c.rowid",
            qualified("o", RawOffering::COLUMNS)
          )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![person_str], RawOffering::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await??;

    raws.into_iter().map(RawOffering::into_offering).collect()
  }

  async fn delete_offering(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let (records, sessions, members) = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<(usize, usize, usize)>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if query_offering(&tx, &id_str)?.is_none() {
          return Ok(Err(CoreError::not_found("offering", &id_str)));
        }

        let records = tx.execute(
          "DELETE FROM records
           WHERE session_id IN (SELECT session_id FROM sessions WHERE offering_id = ?1)",
          params![id_str],
        )?;
        let sessions = tx.execute("DELETE FROM sessions WHERE offering_id = ?1", params![id_str])?;
        let members = tx.execute("DELETE FROM cohort WHERE offering_id = ?1", params![id_str])?;
        tx.execute("DELETE FROM offerings WHERE offering_id = ?1", params![id_str])?;

        tx.commit()?;
        Ok(Ok((records, sessions, members)))
      })
      .await??;

    tracing::debug!(offering_id = %id, records, sessions, members, "offering deleted");
    Ok(())
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn start_session(&self, offering_id: Uuid) -> Result<AttendanceSession> {
    let offering_str = encode_uuid(offering_id);
    let session_str  = encode_uuid(Uuid::new_v4());
    let at_str       = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<RawSession>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(offering) = query_offering(&tx, &offering_str)? else {
          return Ok(Err(CoreError::not_found("offering", &offering_str)));
        };
        if !offering.active {
          return Ok(Err(CoreError::InvalidState(format!(
            "offering {offering_str} is inactive"
          ))));
        }

        let running: Option<i64> = tx
          .query_row(
            "SELECT session_number FROM sessions WHERE offering_id = ?1 AND active = 1",
            params![offering_str],
            |row| row.get(0),
          )
          .optional()?;
        if let Some(number) = running {
          return Ok(Err(CoreError::Conflict(format!(
            "session #{number} of offering {offering_str} is already active; resume it instead"
          ))));
        }

        let next: i64 = tx.query_row(
          "SELECT COALESCE(MAX(session_number), 0) + 1 FROM sessions WHERE offering_id = ?1",
          params![offering_str],
          |row| row.get(0),
        )?;

        match tx.execute(
          "INSERT INTO sessions (session_id, offering_id, session_number, start_time, end_time, active)
           VALUES (?1, ?2, ?3, ?4, NULL, 1)",
          params![session_str, offering_str, next, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_constraint_violation(&e) => {
            return Ok(Err(CoreError::Conflict(format!(
              "offering {offering_str} already has an active session"
            ))));
          }
          Err(e) => return Err(e.into()),
        }
        tx.commit()?;

        Ok(Ok(RawSession {
          session_id:     session_str,
          offering_id:    offering_str,
          session_number: next,
          start_time:     at_str,
          end_time:       None,
          active:         true,
        }))
      })
      .await??;

    let session = raw.into_session()?;
    tracing::debug!(
      session_id = %session.session_id,
      %offering_id,
      number = session.session_number,
      "session started"
    );
    Ok(session)
  }

  async fn close_session(&self, session_id: Uuid) -> Result<AttendanceSession> {
    let id_str = encode_uuid(session_id);
    let at_str = encode_dt(Utc::now());

    let (raw, closed_now) = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<(RawSession, bool)>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if query_session(&tx, &id_str)?.is_none() {
          return Ok(Err(CoreError::not_found("session", &id_str)));
        }
        let changed = tx.execute(
          "UPDATE sessions SET active = 0, end_time = ?2 WHERE session_id = ?1 AND active = 1",
          params![id_str, at_str],
        )?;

        let raw = fetch_session(&tx, &id_str)?;
        tx.commit()?;
        Ok(Ok((raw, changed > 0)))
      })
      .await??;

    let session = raw.into_session()?;
    if closed_now {
      tracing::debug!(%session_id, number = session.session_number, "session closed");
    }
    Ok(session)
  }

  async fn get_session(&self, id: Uuid) -> Result<Option<AttendanceSession>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_session(conn, &id_str)?))
      .await?;
    raw.map(RawSession::into_session).transpose()
  }

  async fn active_session(&self, offering_id: Uuid) -> Result<Option<AttendanceSession>> {
    let offering_str = encode_uuid(offering_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM sessions WHERE offering_id = ?1 AND active = 1",
                RawSession::COLUMNS.join(", ")
              ),
              params![offering_str],
              RawSession::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawSession::into_session).transpose()
  }

  async fn list_sessions(&self, offering_id: Uuid) -> Result<Vec<AttendanceSession>> {
    let offering_str = encode_uuid(offering_id);

    let raws: Vec<RawSession> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM sessions WHERE offering_id = ?1 ORDER BY session_number",
          RawSession::COLUMNS.join(", ")
        ))?;
        let rows = stmt
          .query_map(params![offering_str], RawSession::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSession::into_session).collect()
  }

  // ── Records ───────────────────────────────────────────────────────────────

  async fn record_detection(
    &self,
    session_id:        Uuid,
    person_identifier: String,
    confidence:        Option<f32>,
  ) -> Result<AttendanceRecord> {
    let session_str = encode_uuid(session_id);
    let record_str  = encode_uuid(Uuid::new_v4());
    let at_str      = encode_dt(Utc::now());
    let confidence  = confidence.map(f64::from);

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<RawRecord>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(session) = query_session(&tx, &session_str)? else {
          return Ok(Err(CoreError::not_found("session", &session_str)));
        };
        if !session.active {
          return Ok(Err(CoreError::InvalidState(format!(
            "session {session_str} is not active; attendance can only be recorded while it runs"
          ))));
        }
        let Some(person) = query_cohort_student(&tx, &session.offering_id, &person_identifier)?
        else {
          return Ok(Err(CoreError::not_found("person", &person_identifier)));
        };

        tx.execute(
          "INSERT INTO records (record_id, session_id, person_id, detected_at, status, confidence)
           VALUES (?1, ?2, ?3, ?4, 'present', ?5)
           ON CONFLICT (session_id, person_id) DO UPDATE SET
             detected_at = excluded.detected_at,
             status      = 'present',
             confidence  = excluded.confidence",
          params![record_str, session_str, person.person_id, at_str, confidence],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {} FROM records WHERE session_id = ?1 AND person_id = ?2",
            RawRecord::COLUMNS.join(", ")
          ),
          params![session_str, person.person_id],
          RawRecord::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    let record = raw.into_record()?;
    tracing::debug!(
      %session_id,
      person_id = %record.person_id,
      confidence = ?record.confidence,
      "detection recorded"
    );
    Ok(record)
  }

  async fn list_records(&self, offering_id: Uuid) -> Result<Vec<AttendanceRecord>> {
    let offering_str = encode_uuid(offering_id);

    let raws = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<Vec<RawRecord>>> {
        if query_offering(conn, &offering_str)?.is_none() {
          return Ok(Err(CoreError::not_found("offering", &offering_str)));
        }
        let mut stmt = conn.prepare(&format!(
          "SELECT {}
           FROM records r
           JOIN sessions s ON s.session_id = r.session_id
           WHERE s.offering_id = ?1
           ORDER BY r.detected_at DESC, r.rowid DESC",
          qualified("r", RawRecord::COLUMNS)
        ))?;
        let rows = stmt
          .query_map(params![offering_str], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await??;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn attendance_summary(
    &self,
    person_id:   Uuid,
    offering_id: Uuid,
  ) -> Result<AttendanceSummary> {
    let person_str   = encode_uuid(person_id);
    let offering_str = encode_uuid(offering_id);

    let (presents, totals) = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<(i64, i64)>> {
        if query_offering(conn, &offering_str)?.is_none() {
          return Ok(Err(CoreError::not_found("offering", &offering_str)));
        }
        if query_person(conn, "person_id", &person_str)?.is_none() {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        }

        let totals: i64 = conn.query_row(
          "SELECT COUNT(*) FROM sessions WHERE offering_id = ?1",
          params![offering_str],
          |row| row.get(0),
        )?;
        let presents: i64 = conn.query_row(
          "SELECT COUNT(*)
           FROM records r
           JOIN sessions s ON s.session_id = r.session_id
           WHERE s.offering_id = ?1 AND r.person_id = ?2 AND r.status = 'present'",
          params![offering_str, person_str],
          |row| row.get(0),
        )?;
        Ok(Ok((presents, totals)))
      })
      .await??;

    Ok(AttendanceSummary::new(person_id, offering_id, presents as u32, totals as u32))
  }

  async fn person_summaries(&self, person_id: Uuid) -> Result<Vec<CourseAttendance>> {
    let person_str = encode_uuid(person_id);

    let rows = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<Vec<(RawOffering, i64, i64)>>> {
        if query_person(conn, "person_id", &person_str)?.is_none() {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT {},
             (SELECT COUNT(*) FROM sessions s WHERE s.offering_id = c.offering_id),
             (SELECT COUNT(*)
              FROM records r
              JOIN sessions s ON s.session_id = r.session_id
              WHERE s.offering_id = c.offering_id
                AND r.person_id = c.person_id
                AND r.status = 'present')
           FROM cohort c
           JOIN offerings o ON o.offering_id = c.offering_id
           WHERE c.person_id = ?1
           ORDER BY c.enrolled_at, c.rowid",
          qualified("o", RawOffering::COLUMNS)
        ))?;
        let n = RawOffering::COLUMNS.len();
        let rows = stmt
          .query_map(params![person_str], |row| {
            Ok((RawOffering::from_row(row)?, row.get(n)?, row.get(n + 1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await??;

    rows
      .into_iter()
      .map(|(raw, totals, presents)| {
        let offering = raw.into_offering()?;
        let summary = AttendanceSummary::new(
          person_id,
          offering.offering_id,
          presents as u32,
          totals as u32,
        );
        Ok(CourseAttendance { offering, summary })
      })
      .collect()
  }

  async fn recent_records(&self, person_id: Uuid, limit: u32) -> Result<Vec<AttendanceRecord>> {
    let person_str = encode_uuid(person_id);

    let raws = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<Vec<RawRecord>>> {
        if query_person(conn, "person_id", &person_str)?.is_none() {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        }
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM records
           WHERE person_id = ?1
           ORDER BY detected_at DESC, rowid DESC
           LIMIT ?2",
          RawRecord::COLUMNS.join(", ")
        ))?;
        let rows = stmt
          .query_map(params![person_str, limit], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok(rows))
      })
      .await??;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn dashboard(&self) -> Result<Dashboard> {
    let counts: [i64; 6] = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             (SELECT COUNT(*) FROM people),
             (SELECT COUNT(*) FROM people WHERE role = 'teacher'),
             (SELECT COUNT(*) FROM people WHERE role = 'student'),
             (SELECT COUNT(*) FROM offerings),
             (SELECT COUNT(*) FROM sessions WHERE active = 1),
             (SELECT COUNT(*) FROM enrollment_requests WHERE status = 'pending')",
          [],
          |row| Ok([row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?]),
        )?)
      })
      .await?;

    let [people, teachers, students, offerings, active_sessions, pending_requests] =
      counts.map(|n| n as u32);
    Ok(Dashboard { people, teachers, students, offerings, active_sessions, pending_requests })
  }

  async fn roster(&self, offering_id: Uuid) -> Result<Vec<RosterEntry>> {
    let offering_str = encode_uuid(offering_id);

    let (totals, rows) = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<(i64, Vec<(RawPerson, i64)>)>> {
        if query_offering(conn, &offering_str)?.is_none() {
          return Ok(Err(CoreError::not_found("offering", &offering_str)));
        }

        let totals: i64 = conn.query_row(
          "SELECT COUNT(*) FROM sessions WHERE offering_id = ?1",
          params![offering_str],
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {},
             (SELECT COUNT(*)
              FROM records r
              JOIN sessions s ON s.session_id = r.session_id
              WHERE s.offering_id = c.offering_id
                AND r.person_id = c.person_id
                AND r.status = 'present')
           FROM cohort c
           JOIN people p ON p.person_id = c.person_id
           WHERE c.offering_id = ?1
           ORDER BY c.enrolled_at, c.rowid",
          qualified("p", RawPerson::COLUMNS)
        ))?;
        let rows = stmt
          .query_map(params![offering_str], |row| {
            Ok((RawPerson::from_row(row, 0)?, row.get(RawPerson::COLUMNS.len())?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Ok((totals, rows)))
      })
      .await??;

    rows
      .into_iter()
      .map(|(raw, presents)| {
        let person = raw.into_person()?;
        let summary =
          AttendanceSummary::new(person.person_id, offering_id, presents as u32, totals as u32);
        Ok(RosterEntry { person, summary })
      })
      .collect()
  }

  // ── Face identities ───────────────────────────────────────────────────────

  async fn get_identity(&self, person_id: Uuid) -> Result<Option<FaceIdentity>> {
    let person_str = encode_uuid(person_id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_identity(conn, &person_str)?))
      .await?;
    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn cohort_identities(&self, offering_id: Uuid) -> Result<Vec<(Person, FaceIdentity)>> {
    let offering_str = encode_uuid(offering_id);

    let raws: Vec<(RawPerson, RawIdentity)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {}, {}
           FROM cohort c
           JOIN people p          ON p.person_id = c.person_id
           JOIN face_identities f ON f.person_id = c.person_id
           WHERE c.offering_id = ?1
           ORDER BY c.enrolled_at, c.rowid",
          qualified("p", RawPerson::COLUMNS),
          qualified("f", RawIdentity::COLUMNS)
        ))?;
        let rows = stmt
          .query_map(params![offering_str], |row| {
            Ok((
              RawPerson::from_row(row, 0)?,
              RawIdentity::from_row(row, RawPerson::COLUMNS.len())?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(person, identity)| Ok((person.into_person()?, identity.into_identity()?)))
      .collect()
  }

  async fn enroll_first_time(
    &self,
    person_id: Uuid,
    samples:   Vec<Embedding>,
  ) -> Result<FaceIdentity> {
    let token        = embedding::encode(&samples)?;
    let sample_count = samples.len().min(MAX_SAMPLES) as i64;
    let person_str   = encode_uuid(person_id);
    let at_str       = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<RawIdentity>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if query_person(&tx, "person_id", &person_str)?.is_none() {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        }
        if query_identity(&tx, &person_str)?.is_some() {
          return Ok(Err(CoreError::Conflict(format!(
            "person {person_str} is already enrolled; submit an update for approval"
          ))));
        }

        insert_identity(&tx, &person_str, &token, sample_count, &at_str)?;
        tx.commit()?;
        Ok(Ok(RawIdentity {
          person_id: person_str,
          token,
          sample_count,
          captured_at: at_str,
        }))
      })
      .await??;

    raw.into_identity()
  }

  async fn propose_update(
    &self,
    person_id:     Uuid,
    samples:       Vec<Embedding>,
    preview_image: Vec<u8>,
  ) -> Result<EnrollmentRequest> {
    let token       = embedding::encode(&samples)?;
    let person_str  = encode_uuid(person_id);
    let request_str = encode_uuid(Uuid::new_v4());
    let at_str      = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<RawRequest>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if query_person(&tx, "person_id", &person_str)?.is_none() {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        }
        if pending_request_id(&tx, &person_str)?.is_some() {
          return Ok(Err(pending_conflict(&person_str)));
        }

        match insert_request(&tx, &request_str, &person_str, &token, &preview_image, &at_str) {
          Ok(()) => {}
          Err(e) if is_constraint_violation(&e) => return Ok(Err(pending_conflict(&person_str))),
          Err(e) => return Err(e.into()),
        }

        let raw = fetch_request(&tx, &request_str)?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_request()
  }

  async fn capture_enrollment(
    &self,
    person_id:     Uuid,
    samples:       Vec<Embedding>,
    preview_image: Vec<u8>,
  ) -> Result<CaptureOutcome> {
    let token        = embedding::encode(&samples)?;
    let sample_count = samples.len().min(MAX_SAMPLES) as i64;
    let person_str   = encode_uuid(person_id);
    let request_id   = Uuid::new_v4();
    let request_str  = encode_uuid(request_id);
    let at_str       = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| -> tokio_rusqlite::Result<Outcome<CaptureOutcome>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if query_person(&tx, "person_id", &person_str)?.is_none() {
          return Ok(Err(CoreError::not_found("person", &person_str)));
        }
        if pending_request_id(&tx, &person_str)?.is_some() {
          return Ok(Err(pending_conflict(&person_str)));
        }

        let outcome = if query_identity(&tx, &person_str)?.is_some() {
          insert_request(&tx, &request_str, &person_str, &token, &preview_image, &at_str)?;
          CaptureOutcome::Queued { request_id }
        } else {
          insert_identity(&tx, &person_str, &token, sample_count, &at_str)?;
          CaptureOutcome::Enrolled { samples: sample_count as u32 }
        };

        tx.commit()?;
        Ok(Ok(outcome))
      })
      .await??;

    Ok(outcome)
  }

  async fn get_request(&self, id: Uuid) -> Result<Option<EnrollmentRequest>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(query_request(conn, &id_str)?))
      .await?;
    raw.map(RawRequest::into_request).transpose()
  }

  async fn pending_request(&self, person_id: Uuid) -> Result<Option<EnrollmentRequest>> {
    let person_str = encode_uuid(person_id);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(match pending_request_id(conn, &person_str)? {
          Some(id) => query_request(conn, &id)?,
          None => None,
        })
      })
      .await?;
    raw.map(RawRequest::into_request).transpose()
  }

  async fn list_pending_requests(&self) -> Result<Vec<EnrollmentRequest>> {
    let raws: Vec<RawRequest> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM enrollment_requests
           WHERE status = 'pending'
           ORDER BY created_at, rowid",
          RawRequest::COLUMNS.join(", ")
        ))?;
        let rows = stmt
          .query_map([], RawRequest::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRequest::into_request).collect()
  }

  async fn approve_request(&self, id: Uuid) -> Result<EnrollmentRequest> {
    self.decide_request(id, true).await
  }

  async fn reject_request(&self, id: Uuid) -> Result<EnrollmentRequest> {
    self.decide_request(id, false).await
  }
}
