// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! low-tide-store: `rusqlite`-backed persistence over `jobs` and
//! `job_files`.
//!
//! A `Connection` wrapped in a `parking_lot::Mutex` — SQLite access here is
//! synchronous and brief, so a blocking mutex is the right tool, the same
//! choice this service makes everywhere else for short shared-state
//! sections (see `low-tide-broker`). Callers on the async side are expected
//! to reach this crate through `tokio::task::spawn_blocking`.

mod error;

use std::path::Path;
use std::str::FromStr;

use low_tide_core::{Job, JobFile, JobFileId, JobId, JobStatus};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub use error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    app_id        TEXT NOT NULL,
    url           TEXT NOT NULL,
    original_url  TEXT NOT NULL,
    title         TEXT NOT NULL,
    image_path    TEXT,
    status        TEXT NOT NULL,
    pid           INTEGER,
    exit_code     INTEGER,
    error_message TEXT,
    created_at    INTEGER NOT NULL,
    started_at    INTEGER,
    finished_at   INTEGER,
    archived      INTEGER NOT NULL DEFAULT 0,
    logs          TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS job_files (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id        INTEGER NOT NULL REFERENCES jobs(id),
    path          TEXT NOT NULL,
    size_bytes    INTEGER NOT NULL,
    created_at    INTEGER NOT NULL,
    UNIQUE(job_id, path)
);
CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_job_files_job_id ON job_files(job_id);
";

const EXPECTED_JOB_COLUMNS: &[&str] = &[
    "id",
    "app_id",
    "url",
    "original_url",
    "title",
    "image_path",
    "status",
    "pid",
    "exit_code",
    "error_message",
    "created_at",
    "started_at",
    "finished_at",
    "archived",
    "logs",
];

/// Persistence layer over `jobs` and `job_files`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path`, applying pragmas and schema,
    /// then run startup recovery.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|source| StoreError::CreateDir { path: parent.display().to_string(), source })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|source| StoreError::Open { path: path.display().to_string(), source })?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000; PRAGMA synchronous=NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)?;

        let store = Self { conn: Mutex::new(conn) };
        store.check_schema_forward_compat()?;
        let recovered = store.recover_on_startup()?;
        if recovered > 0 {
            tracing::warn!(recovered, "rewrote orphaned running jobs from a previous run");
        }
        Ok(store)
    }

    fn check_schema_forward_compat(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("PRAGMA table_info(jobs)")?;
        let present: Vec<String> =
            stmt.query_map([], |row| row.get::<_, String>(1))?.filter_map(Result::ok).collect();
        for expected in EXPECTED_JOB_COLUMNS {
            if !present.iter().any(|name| name == expected) {
                tracing::warn!(column = expected, "jobs table missing expected column; schema may predate this build");
            }
        }
        Ok(())
    }

    /// Rewrite stray `running` rows left by a crash to `failed`.
    fn recover_on_startup(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', error_message = 'server restarted during job', pid = NULL
             WHERE status = 'running'",
            [],
        )?;
        Ok(changed)
    }

    pub fn insert_job(
        &self,
        app_id: &str,
        url: &str,
        original_url: &str,
        title: &str,
        created_at: i64,
    ) -> Result<JobId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO jobs (app_id, url, original_url, title, status, created_at, archived, logs)
             VALUES (?1, ?2, ?3, ?4, 'queued', ?5, 0, '')",
            params![app_id, url, original_url, title, created_at],
        )?;
        Ok(JobId(conn.last_insert_rowid()))
    }

    pub fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let conn = self.conn.lock();
        let job = conn
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id.0], row_to_job)
            .optional()?;
        let Some(mut job) = job else { return Ok(None) };
        job.files = Self::list_job_files_locked(&conn, id)?;
        Ok(Some(job))
    }

    /// List jobs newest-first, optionally filtered by status. Files are not
    /// loaded (use `get_job` for that) and `logs` is never populated here.
    pub fn list_jobs(&self, status: Option<JobStatus>, limit: Option<i64>) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn.lock();
        let sql = match (status.is_some(), limit.is_some()) {
            (true, true) => {
                "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2"
            }
            (true, false) => "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at DESC",
            (false, true) => "SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1",
            (false, false) => "SELECT * FROM jobs ORDER BY created_at DESC",
        };
        let mut stmt = conn.prepare(sql)?;
        let mut jobs = match (status, limit) {
            (Some(status), Some(limit)) => {
                stmt.query_map(params![status.to_string(), limit], row_to_job)?.collect::<Result<Vec<_>, _>>()?
            }
            (Some(status), None) => {
                stmt.query_map(params![status.to_string()], row_to_job)?.collect::<Result<Vec<_>, _>>()?
            }
            (None, Some(limit)) => {
                stmt.query_map(params![limit], row_to_job)?.collect::<Result<Vec<_>, _>>()?
            }
            (None, None) => stmt.query_map([], row_to_job)?.collect::<Result<Vec<_>, _>>()?,
        };
        for job in &mut jobs {
            job.logs.clear();
        }
        Ok(jobs)
    }

    /// The smallest id among `queued` jobs, i.e. the next one due to run.
    pub fn next_queued_job_id(&self) -> Result<Option<JobId>, StoreError> {
        let conn = self.conn.lock();
        let id: Option<i64> =
            conn.query_row("SELECT MIN(id) FROM jobs WHERE status = 'queued'", [], |row| row.get(0))?;
        Ok(id.map(JobId))
    }

    pub fn mark_running(&self, id: JobId, pid: u32, started_at: i64) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE jobs SET status = 'running', pid = ?1, started_at = ?2 WHERE id = ?3",
            params![pid, started_at, id.0],
        )?;
        Ok(())
    }

    pub fn mark_terminal(
        &self,
        id: JobId,
        status: JobStatus,
        exit_code: Option<i32>,
        error_message: Option<&str>,
        log: &str,
        finished_at: i64,
    ) -> Result<(), StoreError> {
        debug_assert!(status.is_terminal());
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE jobs SET status = ?1, pid = NULL, exit_code = ?2, error_message = ?3,
                logs = ?4, finished_at = ?5
             WHERE id = ?6",
            params![status.to_string(), exit_code, error_message, log, finished_at, id.0],
        )?;
        Ok(())
    }

    /// Atomically reset a job to `queued`, clearing timestamps, pid, exit
    /// code, error, logs, archival, and deleting its `JobFile` rows.
    pub fn reset_for_retry(&self, id: JobId, created_at: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE jobs SET status = 'queued', pid = NULL, exit_code = NULL, error_message = NULL,
                started_at = NULL, finished_at = NULL, archived = 0, logs = '', created_at = ?1
             WHERE id = ?2",
            params![created_at, id.0],
        )?;
        tx.execute("DELETE FROM job_files WHERE job_id = ?1", params![id.0])?;
        tx.commit()?;
        Ok(())
    }

    pub fn archive(&self, id: JobId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE jobs SET archived = 1 WHERE id = ?1", params![id.0])?;
        Ok(())
    }

    pub fn unarchive(&self, id: JobId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE jobs SET archived = 0 WHERE id = ?1", params![id.0])?;
        Ok(())
    }

    pub fn update_title(&self, id: JobId, title: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE jobs SET title = ?1 WHERE id = ?2", params![title, id.0])?;
        Ok(())
    }

    pub fn update_image_path(&self, id: JobId, image_path: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE jobs SET image_path = ?1 WHERE id = ?2", params![image_path, id.0])?;
        Ok(())
    }

    /// Delete a job row and its `JobFile` rows. Returns whether it existed.
    pub fn delete_job(&self, id: JobId) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM job_files WHERE job_id = ?1", params![id.0])?;
        let deleted = tx.execute("DELETE FROM jobs WHERE id = ?1", params![id.0])?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    pub fn delete_job_files_for_job(&self, id: JobId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM job_files WHERE job_id = ?1", params![id.0])?;
        Ok(())
    }

    pub fn mark_cleaned(&self, id: JobId) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("UPDATE jobs SET status = 'cleaned' WHERE id = ?1", params![id.0])?;
        Ok(())
    }

    /// Insert a new `JobFile` row, or refresh `size_bytes`/`created_at` if
    /// `(job_id, path)` already exists.
    pub fn upsert_job_file(
        &self,
        job_id: JobId,
        path: &str,
        size_bytes: u64,
        created_at: i64,
    ) -> Result<JobFileId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO job_files (job_id, path, size_bytes, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(job_id, path) DO UPDATE SET size_bytes = excluded.size_bytes, created_at = excluded.created_at",
            params![job_id.0, path, size_bytes as i64, created_at],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM job_files WHERE job_id = ?1 AND path = ?2",
            params![job_id.0, path],
            |row| row.get(0),
        )?;
        Ok(JobFileId(id))
    }

    pub fn delete_job_file_by_path(&self, job_id: JobId, path: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted =
            conn.execute("DELETE FROM job_files WHERE job_id = ?1 AND path = ?2", params![job_id.0, path])?;
        Ok(deleted > 0)
    }

    pub fn list_job_files(&self, job_id: JobId) -> Result<Vec<JobFile>, StoreError> {
        let conn = self.conn.lock();
        Self::list_job_files_locked(&conn, job_id)
    }

    fn list_job_files_locked(conn: &Connection, job_id: JobId) -> Result<Vec<JobFile>, StoreError> {
        let mut stmt =
            conn.prepare("SELECT id, job_id, path, size_bytes, created_at FROM job_files WHERE job_id = ?1 ORDER BY path")?;
        let files = stmt.query_map(params![job_id.0], row_to_job_file)?.collect::<Result<Vec<_>, _>>()?;
        Ok(files)
    }

    pub fn job_file_exists(&self, job_id: JobId, path: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM job_files WHERE job_id = ?1 AND path = ?2",
            params![job_id.0, path],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_job_file(&self, id: JobFileId) -> Result<Option<JobFile>, StoreError> {
        let conn = self.conn.lock();
        let file = conn
            .query_row(
                "SELECT id, job_id, path, size_bytes, created_at FROM job_files WHERE id = ?1",
                params![id.0],
                row_to_job_file,
            )
            .optional()?;
        Ok(file)
    }
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    let status: String = row.get("status")?;
    let status = JobStatus::from_str(&status).map_err(|_| {
        rusqlite::Error::InvalidColumnType(0, "status".to_string(), rusqlite::types::Type::Text)
    })?;
    Ok(Job {
        id: JobId(row.get("id")?),
        app_id: row.get("app_id")?,
        url: row.get("url")?,
        original_url: row.get("original_url")?,
        title: row.get("title")?,
        image_path: row.get("image_path")?,
        status,
        pid: row.get::<_, Option<i64>>("pid")?.map(|p| p as u32),
        exit_code: row.get("exit_code")?,
        error_message: row.get("error_message")?,
        created_at: row.get("created_at")?,
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        archived: row.get::<_, i64>("archived")? != 0,
        logs: row.get("logs")?,
        files: Vec::new(),
    })
}

fn row_to_job_file(row: &Row<'_>) -> rusqlite::Result<JobFile> {
    Ok(JobFile {
        id: JobFileId(row.get(0)?),
        job_id: JobId(row.get(1)?),
        path: row.get(2)?,
        size_bytes: row.get::<_, i64>(3)? as u64,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
