//! SQLite-backed document store.
//!
//! Each collection is a table holding the JSON document plus the handful of
//! key columns the board filters on. Uniqueness rules are UNIQUE indexes, and
//! read-modify-write primitives run inside an immediate transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Interview, InterviewId, InterviewStatus,
    Job, JobId, JobQuery, Party, Report, ReportId, ReportStatus, UserId,
};
use super::repository::{
    ApplicationStore, InterviewStore, JobStore, ReportStore, SavedJobStore, StoreError,
};

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    posted_by TEXT NOT NULL,
    posted_on TEXT NOT NULL,
    expiry_date TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_jobs_posted_by ON jobs(posted_by);
CREATE INDEX IF NOT EXISTS idx_jobs_expiry ON jobs(expiry_date);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    seeker_id TEXT NOT NULL,
    employer_id TEXT NOT NULL,
    deleted_by_employer INTEGER NOT NULL DEFAULT 0,
    deleted_by_seeker INTEGER NOT NULL DEFAULT 0,
    submitted_on TEXT NOT NULL,
    body TEXT NOT NULL,
    UNIQUE (job_id, seeker_id)
);
CREATE INDEX IF NOT EXISTS idx_applications_employer ON applications(employer_id);
CREATE INDEX IF NOT EXISTS idx_applications_seeker ON applications(seeker_id);

CREATE TABLE IF NOT EXISTS interviews (
    id TEXT PRIMARY KEY,
    application_id TEXT NOT NULL,
    job_id TEXT NOT NULL,
    candidate_id TEXT NOT NULL,
    employer_id TEXT NOT NULL,
    date_time TEXT NOT NULL,
    body TEXT NOT NULL,
    UNIQUE (application_id, job_id, candidate_id)
);
CREATE INDEX IF NOT EXISTS idx_interviews_job ON interviews(job_id);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY,
    reported_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    body TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reports_reporter ON reports(reported_by);
"#;

const SCHEMA_V2: &str = r#"
CREATE TABLE IF NOT EXISTS saved_jobs (
    user_id TEXT NOT NULL,
    job_id TEXT NOT NULL,
    PRIMARY KEY (user_id, job_id)
);
CREATE INDEX IF NOT EXISTS idx_saved_jobs_job ON saved_jobs(job_id);
"#;

/// Applied in order; `user_version` counts how many have run.
const MIGRATIONS: &[&str] = &[SCHEMA_V1, SCHEMA_V2];
const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(map_sqlite)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let version: i32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .map_err(map_sqlite)?;

        if !(0..=SCHEMA_VERSION).contains(&version) {
            return Err(StoreError::Unavailable(format!(
                "unsupported database schema version {version}"
            )));
        }
        for (applied, migration) in MIGRATIONS.iter().enumerate().skip(version as usize) {
            conn.execute_batch(migration).map_err(map_sqlite)?;
            conn.execute_batch(&format!("PRAGMA user_version = {};", applied + 1))
                .map_err(map_sqlite)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }

    fn query_documents<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<T>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(map_sqlite)?;
        let bodies = stmt
            .query_map(params, |row| row.get::<_, String>(0))
            .map_err(map_sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;
        bodies.iter().map(|body| decode(body)).collect()
    }

    fn query_document<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<T>, StoreError> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row(sql, params, |row| row.get(0))
            .optional()
            .map_err(map_sqlite)?;
        body.as_deref().map(decode).transpose()
    }

    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        conn.execute(sql, params).map_err(map_sqlite)
    }

    /// Loads one document, applies `change`, and writes it back atomically.
    fn modify<T, F>(
        &self,
        select: &str,
        update: &str,
        id: &str,
        change: F,
    ) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> Vec<rusqlite::types::Value>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_sqlite)?;

        let body: Option<String> = tx
            .query_row(select, params![id], |row| row.get(0))
            .optional()
            .map_err(map_sqlite)?;
        let Some(body) = body else {
            return Ok(None);
        };

        let mut document: T = decode(&body)?;
        let mut values = change(&mut document);
        values.insert(0, rusqlite::types::Value::Text(encode(&document)?));
        values.push(rusqlite::types::Value::Text(id.to_string()));

        tx.execute(update, rusqlite::params_from_iter(values))
            .map_err(map_sqlite)?;
        tx.commit().map_err(map_sqlite)?;
        Ok(Some(document))
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode<T: Serialize>(document: &T) -> Result<String, StoreError> {
    serde_json::to_string(document)
        .map_err(|err| StoreError::Unavailable(format!("document encoding failed: {err}")))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, StoreError> {
    serde_json::from_str(body)
        .map_err(|err| StoreError::Unavailable(format!("document decoding failed: {err}")))
}

fn map_sqlite(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

impl JobStore for SqliteDocumentStore {
    fn insert(&self, job: Job) -> Result<Job, StoreError> {
        self.execute(
            "INSERT INTO jobs (id, posted_by, posted_on, expiry_date, body) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.id.as_str(),
                job.posted_by.as_str(),
                timestamp(&job.posted_on),
                timestamp(&job.expiry_date),
                encode(&job)?
            ],
        )?;
        Ok(job)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        self.query_document("SELECT body FROM jobs WHERE id = ?1", params![id.as_str()])
    }

    fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let jobs: Vec<Job> =
            self.query_documents("SELECT body FROM jobs ORDER BY posted_on DESC, id", [])?;
        Ok(jobs.into_iter().filter(|job| query.matches(job)).collect())
    }

    fn list_by_owner(&self, employer: &UserId) -> Result<Vec<Job>, StoreError> {
        self.query_documents(
            "SELECT body FROM jobs WHERE posted_by = ?1 ORDER BY posted_on DESC, id",
            params![employer.as_str()],
        )
    }

    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        self.query_documents(
            "SELECT body FROM jobs WHERE expiry_date <= ?1 ORDER BY expiry_date, id",
            params![timestamp(&now)],
        )
    }

    fn add_applicant(&self, id: &JobId, seeker: &UserId) -> Result<(), StoreError> {
        self.modify(
            "SELECT body FROM jobs WHERE id = ?1",
            "UPDATE jobs SET body = ?1 WHERE id = ?2",
            id.as_str(),
            |job: &mut Job| {
                job.applicants.insert(seeker.clone());
                Vec::new()
            },
        )?
        .map(|_| ())
        .ok_or(StoreError::NotFound)
    }

    fn remove_applicant(&self, id: &JobId, seeker: &UserId) -> Result<bool, StoreError> {
        let mut removed = false;
        self.modify(
            "SELECT body FROM jobs WHERE id = ?1",
            "UPDATE jobs SET body = ?1 WHERE id = ?2",
            id.as_str(),
            |job: &mut Job| {
                removed = job.applicants.remove(seeker);
                Vec::new()
            },
        )?
        .ok_or(StoreError::NotFound)?;
        Ok(removed)
    }

    fn delete(&self, id: &JobId) -> Result<bool, StoreError> {
        Ok(self.execute("DELETE FROM jobs WHERE id = ?1", params![id.as_str()])? > 0)
    }
}

impl ApplicationStore for SqliteDocumentStore {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, StoreError> {
        let inserted = self.execute(
            "INSERT INTO applications (id, job_id, seeker_id, employer_id, deleted_by_employer, deleted_by_seeker, submitted_on, body) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8 WHERE EXISTS (SELECT 1 FROM jobs WHERE id = ?2)",
            params![
                record.id.as_str(),
                record.job.job_id.as_str(),
                record.job_seeker.id.as_str(),
                record.employer.id.as_str(),
                record.deleted_by.employer,
                record.deleted_by.job_seeker,
                timestamp(&record.submitted_on),
                encode(&record)?
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        self.query_document(
            "SELECT body FROM applications WHERE id = ?1",
            params![id.as_str()],
        )
    }

    fn find_for_seeker(
        &self,
        job: &JobId,
        seeker: &UserId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        self.query_document(
            "SELECT body FROM applications WHERE job_id = ?1 AND seeker_id = ?2",
            params![job.as_str(), seeker.as_str()],
        )
    }

    fn list_for_employer(&self, employer: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.query_documents(
            "SELECT body FROM applications WHERE employer_id = ?1 AND deleted_by_employer = 0 \
             ORDER BY submitted_on DESC, id",
            params![employer.as_str()],
        )
    }

    fn list_for_seeker(&self, seeker: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.query_documents(
            "SELECT body FROM applications WHERE seeker_id = ?1 AND deleted_by_seeker = 0 \
             ORDER BY submitted_on DESC, id",
            params![seeker.as_str()],
        )
    }

    fn set_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError> {
        self.modify(
            "SELECT body FROM applications WHERE id = ?1",
            "UPDATE applications SET body = ?1 WHERE id = ?2",
            id.as_str(),
            |record: &mut ApplicationRecord| {
                record.status = status;
                Vec::new()
            },
        )?
        .ok_or(StoreError::NotFound)
    }

    fn mark_deleted(
        &self,
        id: &ApplicationId,
        party: Party,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        self.modify(
            "SELECT body FROM applications WHERE id = ?1",
            "UPDATE applications SET body = ?1, deleted_by_employer = ?2, deleted_by_seeker = ?3 WHERE id = ?4",
            id.as_str(),
            |record: &mut ApplicationRecord| {
                record.deleted_by.set(party);
                vec![
                    rusqlite::types::Value::Integer(i64::from(record.deleted_by.employer)),
                    rusqlite::types::Value::Integer(i64::from(record.deleted_by.job_seeker)),
                ]
            },
        )
    }

    fn list_released(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.query_documents(
            "SELECT body FROM applications WHERE deleted_by_employer = 1 AND deleted_by_seeker = 1 \
             ORDER BY submitted_on DESC, id",
            [],
        )
    }

    fn delete(&self, id: &ApplicationId) -> Result<bool, StoreError> {
        Ok(self.execute(
            "DELETE FROM applications WHERE id = ?1",
            params![id.as_str()],
        )? > 0)
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        self.execute(
            "DELETE FROM applications WHERE job_id = ?1",
            params![job.as_str()],
        )
    }
}

impl InterviewStore for SqliteDocumentStore {
    fn insert(&self, interview: Interview) -> Result<Interview, StoreError> {
        let inserted = self.execute(
            "INSERT INTO interviews (id, application_id, job_id, candidate_id, employer_id, date_time, body) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7 WHERE EXISTS (SELECT 1 FROM jobs WHERE id = ?3)",
            params![
                interview.id.as_str(),
                interview.application_id.as_str(),
                interview.job_id.as_str(),
                interview.candidate_id.as_str(),
                interview.employer_id.as_str(),
                timestamp(&interview.date_time),
                encode(&interview)?
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(interview)
    }

    fn fetch(&self, id: &InterviewId) -> Result<Option<Interview>, StoreError> {
        self.query_document(
            "SELECT body FROM interviews WHERE id = ?1",
            params![id.as_str()],
        )
    }

    fn list_for_user(&self, user: &UserId) -> Result<Vec<Interview>, StoreError> {
        self.query_documents(
            "SELECT body FROM interviews WHERE employer_id = ?1 OR candidate_id = ?1 \
             ORDER BY date_time, id",
            params![user.as_str()],
        )
    }

    fn list_by_job(&self, job: &JobId) -> Result<Vec<Interview>, StoreError> {
        self.query_documents(
            "SELECT body FROM interviews WHERE job_id = ?1 ORDER BY date_time, id",
            params![job.as_str()],
        )
    }

    fn set_status(
        &self,
        id: &InterviewId,
        status: InterviewStatus,
    ) -> Result<Interview, StoreError> {
        self.modify(
            "SELECT body FROM interviews WHERE id = ?1",
            "UPDATE interviews SET body = ?1 WHERE id = ?2",
            id.as_str(),
            |interview: &mut Interview| {
                interview.status = status;
                Vec::new()
            },
        )?
        .ok_or(StoreError::NotFound)
    }

    fn delete(&self, id: &InterviewId) -> Result<bool, StoreError> {
        Ok(self.execute("DELETE FROM interviews WHERE id = ?1", params![id.as_str()])? > 0)
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        self.execute(
            "DELETE FROM interviews WHERE job_id = ?1",
            params![job.as_str()],
        )
    }
}

impl ReportStore for SqliteDocumentStore {
    fn insert(&self, report: Report) -> Result<Report, StoreError> {
        self.execute(
            "INSERT INTO reports (id, reported_by, created_at, body) VALUES (?1, ?2, ?3, ?4)",
            params![
                report.id.as_str(),
                report.reported_by.as_str(),
                timestamp(&report.created_at),
                encode(&report)?
            ],
        )?;
        Ok(report)
    }

    fn fetch(&self, id: &ReportId) -> Result<Option<Report>, StoreError> {
        self.query_document("SELECT body FROM reports WHERE id = ?1", params![id.as_str()])
    }

    fn list_all(&self) -> Result<Vec<Report>, StoreError> {
        self.query_documents("SELECT body FROM reports ORDER BY created_at DESC, id", [])
    }

    fn list_by_reporter(&self, reporter: &UserId) -> Result<Vec<Report>, StoreError> {
        self.query_documents(
            "SELECT body FROM reports WHERE reported_by = ?1 ORDER BY created_at DESC, id",
            params![reporter.as_str()],
        )
    }

    fn set_status(&self, id: &ReportId, status: ReportStatus) -> Result<Report, StoreError> {
        self.modify(
            "SELECT body FROM reports WHERE id = ?1",
            "UPDATE reports SET body = ?1 WHERE id = ?2",
            id.as_str(),
            |report: &mut Report| {
                report.status = status;
                Vec::new()
            },
        )?
        .ok_or(StoreError::NotFound)
    }

    fn delete(&self, id: &ReportId) -> Result<bool, StoreError> {
        Ok(self.execute("DELETE FROM reports WHERE id = ?1", params![id.as_str()])? > 0)
    }
}

impl SavedJobStore for SqliteDocumentStore {
    fn save(&self, user: &UserId, job: &JobId) -> Result<(), StoreError> {
        let inserted = self.execute(
            "INSERT INTO saved_jobs (user_id, job_id) \
             SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM jobs WHERE id = ?2)",
            params![user.as_str(), job.as_str()],
        )?;
        if inserted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn unsave(&self, user: &UserId, job: &JobId) -> Result<bool, StoreError> {
        Ok(self.execute(
            "DELETE FROM saved_jobs WHERE user_id = ?1 AND job_id = ?2",
            params![user.as_str(), job.as_str()],
        )? > 0)
    }

    fn list_saved(&self, user: &UserId) -> Result<Vec<JobId>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT job_id FROM saved_jobs WHERE user_id = ?1 ORDER BY rowid")
            .map_err(map_sqlite)?;
        let ids = stmt
            .query_map(params![user.as_str()], |row| row.get::<_, String>(0))
            .map_err(map_sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sqlite)?;
        Ok(ids.into_iter().map(JobId).collect())
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        self.execute(
            "DELETE FROM saved_jobs WHERE job_id = ?1",
            params![job.as_str()],
        )
    }
}
