//! SQLite-based job store implementation.
//!
//! Results are stored as JSON text. Timestamps are RFC 3339 with nanosecond
//! precision so that `ORDER BY created_at` sorts chronologically.

use super::JobStore;
use crate::error::{Result, VidscanError};
use crate::job::{Job, JobFilter, JobId, JobResult, JobUpdate};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_reference TEXT NOT NULL,
        title TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        result_json TEXT,
        error_message TEXT,
        created_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
    CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
"#;

const SELECT_COLUMNS: &str =
    "id, source_reference, title, status, result_json, error_message, created_at, started_at, completed_at";

/// SQLite-based job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

/// A job row before status/JSON/timestamp decoding.
struct JobRow {
    id: i64,
    source_reference: String,
    title: Option<String>,
    status: String,
    result_json: Option<String>,
    error_message: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_reference: row.get(1)?,
            title: row.get(2)?,
            status: row.get(3)?,
            result_json: row.get(4)?,
            error_message: row.get(5)?,
            created_at: row.get(6)?,
            started_at: row.get(7)?,
            completed_at: row.get(8)?,
        })
    }

    fn into_job(self) -> Result<Job> {
        let result = match self.result_json {
            Some(json) => Some(serde_json::from_str::<JobResult>(&json).map_err(|e| {
                VidscanError::Store(format!("Corrupt result for job {}: {}", self.id, e))
            })?),
            None => None,
        };

        Ok(Job {
            id: JobId(self.id),
            source_reference: self.source_reference,
            title: self.title,
            status: self.status.parse()?,
            result,
            error_message: self.error_message,
            created_at: parse_timestamp(&self.created_at)?,
            started_at: self.started_at.as_deref().map(parse_timestamp).transpose()?,
            completed_at: self.completed_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VidscanError::Store(format!("Invalid timestamp '{}': {}", s, e)))
}

impl SqliteJobStore {
    /// Open (or create) a job database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets pollers read while a worker writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite job store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VidscanError::Store(format!("Failed to acquire lock: {}", e)))
    }

    fn read_job(conn: &Connection, id: JobId) -> Result<Option<Job>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", SELECT_COLUMNS),
                params![id.0],
                JobRow::from_row,
            )
            .optional()?;

        row.map(JobRow::into_job).transpose()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self))]
    async fn create(&self, source_reference: &str) -> Result<JobId> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO jobs (source_reference, status, created_at) VALUES (?1, 'pending', ?2)",
            params![source_reference, format_timestamp(&Utc::now())],
        )?;

        let id = JobId(conn.last_insert_rowid());
        debug!("Created job {}", id);
        Ok(id)
    }

    async fn get(&self, id: JobId) -> Result<Job> {
        let conn = self.lock()?;
        Self::read_job(&conn, id)?.ok_or(VidscanError::NotFound(id))
    }

    #[instrument(skip(self, update), fields(job_id = %id))]
    async fn update(&self, id: JobId, update: JobUpdate) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut job = Self::read_job(&tx, id)?.ok_or(VidscanError::NotFound(id))?;
        update.apply_to(&mut job)?;

        let result_json = job.result.as_ref().map(serde_json::to_string).transpose()?;

        tx.execute(
            r#"
            UPDATE jobs
            SET title = ?2, status = ?3, result_json = ?4, error_message = ?5,
                started_at = ?6, completed_at = ?7
            WHERE id = ?1
            "#,
            params![
                id.0,
                job.title,
                job.status.as_str(),
                result_json,
                job.error_message,
                job.started_at.as_ref().map(format_timestamp),
                job.completed_at.as_ref().map(format_timestamp),
            ],
        )?;

        tx.commit()?;
        debug!("Job {} now {}", id, job.status);
        Ok(())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let conn = self.lock()?;
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        let rows: Vec<JobRow> = match filter.status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![status.as_str(), limit], JobRow::from_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?1",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit], JobRow::from_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
        };

        rows.into_iter().map(JobRow::into_job).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Severity, Verdict};
    use crate::job::JobStatus;
    use crate::media::VideoMetadata;
    use crate::transcription::{Transcript, TranscriptSegment};

    fn sample_result() -> JobResult {
        JobResult {
            metadata: VideoMetadata {
                id: "dQw4w9WgXcQ".to_string(),
                title: "Sample".to_string(),
                ..Default::default()
            },
            transcript: Transcript::new(
                vec![TranscriptSegment::new(0.0, 2.5, "hello there".to_string())],
                "en".to_string(),
            ),
            analysis: Verdict {
                ai_generated_score: 12,
                dangerous_content: true,
                danger_categories: vec!["violence".to_string()],
                danger_severity: Some(Severity::Low),
                explanation: None,
            },
            processed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sqlite_job_lifecycle() {
        let store = SqliteJobStore::in_memory().unwrap();
        let id = store.create("dQw4w9WgXcQ").await.unwrap();

        store.update(id, JobUpdate::processing()).await.unwrap();
        store.update(id, JobUpdate::title("Sample")).await.unwrap();
        store.update(id, JobUpdate::completed(sample_result())).await.unwrap();

        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.title.as_deref(), Some("Sample"));
        assert!(job.is_consistent());

        let result = job.result.unwrap();
        assert_eq!(result.transcript.language, "en");
        assert_eq!(result.analysis.danger_severity, Some(Severity::Low));
    }

    #[tokio::test]
    async fn test_sqlite_rejects_illegal_transition() {
        let store = SqliteJobStore::in_memory().unwrap();
        let id = store.create("dQw4w9WgXcQ").await.unwrap();

        let err = store.update(id, JobUpdate::completed(sample_result())).await.unwrap_err();
        assert!(matches!(err, VidscanError::InvalidTransition { .. }));

        let job = store.get(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn test_sqlite_list_filters_and_orders() {
        let store = SqliteJobStore::in_memory().unwrap();
        let a = store.create("aaaaaaaaaaa").await.unwrap();
        let b = store.create("bbbbbbbbbbb").await.unwrap();
        let c = store.create("ccccccccccc").await.unwrap();
        store.update(b, JobUpdate::processing()).await.unwrap();

        let all = store.list(&JobFilter::default()).await.unwrap();
        let ids: Vec<JobId> = all.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![c, b, a]);

        let limited = store.list(&JobFilter::default().with_limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        let pending = store
            .list(&JobFilter::default().with_status(JobStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_missing_job() {
        let store = SqliteJobStore::in_memory().unwrap();
        assert!(matches!(store.get(JobId(5)).await, Err(VidscanError::NotFound(_))));
    }
}
