//! SQL schema for the Rollcall SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE … IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS people (
    person_id   TEXT PRIMARY KEY,
    role        TEXT NOT NULL,          -- 'admin' | 'teacher' | 'student'
    external_id TEXT NOT NULL UNIQUE,   -- roll number / staff id
    full_name   TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

-- One login per (person, role); the login name is globally unique.
CREATE TABLE IF NOT EXISTS credentials (
    person_id     TEXT NOT NULL REFERENCES people(person_id),
    role          TEXT NOT NULL,
    login         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    last_login_at TEXT,
    PRIMARY KEY (person_id, role)
);

CREATE TABLE IF NOT EXISTS offerings (
    offering_id TEXT PRIMARY KEY,
    course_code TEXT NOT NULL,
    course_name TEXT NOT NULL,
    teacher_id  TEXT NOT NULL REFERENCES people(person_id),
    term        TEXT NOT NULL,
    room        TEXT,
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS cohort (
    offering_id TEXT NOT NULL REFERENCES offerings(offering_id),
    person_id   TEXT NOT NULL REFERENCES people(person_id),
    enrolled_at TEXT NOT NULL,
    PRIMARY KEY (offering_id, person_id)
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id     TEXT PRIMARY KEY,
    offering_id    TEXT NOT NULL REFERENCES offerings(offering_id),
    session_number INTEGER NOT NULL,
    start_time     TEXT NOT NULL,
    end_time       TEXT,
    active         INTEGER NOT NULL DEFAULT 1,
    UNIQUE (offering_id, session_number)
);

-- At most one active session per offering.
CREATE UNIQUE INDEX IF NOT EXISTS sessions_one_active_idx
    ON sessions(offering_id) WHERE active = 1;

CREATE TABLE IF NOT EXISTS records (
    record_id   TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL REFERENCES sessions(session_id),
    person_id   TEXT NOT NULL REFERENCES people(person_id),
    detected_at TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'present',
    confidence  REAL,
    UNIQUE (session_id, person_id)
);

CREATE TABLE IF NOT EXISTS face_identities (
    person_id    TEXT PRIMARY KEY REFERENCES people(person_id),
    token        TEXT NOT NULL,     -- embedding codec token
    sample_count INTEGER NOT NULL,
    captured_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollment_requests (
    request_id    TEXT PRIMARY KEY,
    person_id     TEXT NOT NULL REFERENCES people(person_id),
    token         TEXT NOT NULL,
    preview_image BLOB NOT NULL,
    status        TEXT NOT NULL DEFAULT 'pending',
    created_at    TEXT NOT NULL,
    decided_at    TEXT
);

-- At most one pending request per person.
CREATE UNIQUE INDEX IF NOT EXISTS enrollment_requests_one_pending_idx
    ON enrollment_requests(person_id) WHERE status = 'pending';

CREATE INDEX IF NOT EXISTS sessions_offering_idx ON sessions(offering_id);
CREATE INDEX IF NOT EXISTS records_session_idx   ON records(session_id);
CREATE INDEX IF NOT EXISTS cohort_person_idx     ON cohort(person_id);

PRAGMA user_version = 1;
";
