//! Sync job persistence.
//!
//! Status transitions are single conditional UPDATEs so two workers can never
//! both claim a job or finish one twice.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use ledgersync_core::JobRepository;
use ledgersync_domain::{Job, JobStatus, JobType, NewJob, Result as DomainResult, SyncError, SyncResults};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::manager::{map_join_error, map_sql_error, DbManager};

const JOB_COLUMNS: &str = "id, company_id, job_type, from_date, to_date, status, started_at, \
                           completed_at, error_message, results_json, created_at";

pub struct SqlCipherJobRepository {
    db: Arc<DbManager>,
}

impl SqlCipherJobRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobRepository for SqlCipherJobRepository {
    async fn create_job(&self, job: &NewJob) -> DomainResult<Job> {
        if job.from_date > job.to_date {
            return Err(SyncError::Validation(format!(
                "job date range is inverted ({} > {})",
                job.from_date, job.to_date
            )));
        }

        let db = Arc::clone(&self.db);
        let job = job.clone();

        task::spawn_blocking(move || -> DomainResult<Job> {
            let conn = db.get_connection()?;
            insert_job(&conn, &job, Utc::now().timestamp())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_job(&self, job_id: i64) -> DomainResult<Option<Job>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<Job>> {
            let conn = db.get_connection()?;
            query_job(&conn, job_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn claim_job(&self, job_id: i64, started_at: i64) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE sync_jobs SET status = 'running', started_at = ?2
                     WHERE id = ?1 AND status = 'pending'",
                    params![job_id, started_at],
                )
                .map_err(map_sql_error)?;
            Ok(updated == 1)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn complete_job(
        &self,
        job_id: i64,
        results: &SyncResults,
        completed_at: i64,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let results_json = serde_json::to_string(results)
            .map_err(|err| SyncError::Internal(format!("failed to encode job results: {err}")))?;

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE sync_jobs SET status = 'completed', results_json = ?2, completed_at = ?3
                     WHERE id = ?1 AND status = 'running'",
                    params![job_id, results_json, completed_at],
                )
                .map_err(map_sql_error)?;
            ensure_transitioned(updated, job_id, JobStatus::Completed)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn fail_job(&self, job_id: i64, message: &str, completed_at: i64) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let message = message.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let updated = conn
                .execute(
                    "UPDATE sync_jobs SET status = 'failed', error_message = ?2, completed_at = ?3
                     WHERE id = ?1 AND status = 'running'",
                    params![job_id, message, completed_at],
                )
                .map_err(map_sql_error)?;
            ensure_transitioned(updated, job_id, JobStatus::Failed)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_pending(&self, limit: usize) -> DomainResult<Vec<Job>> {
        let db = Arc::clone(&self.db);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        task::spawn_blocking(move || -> DomainResult<Vec<Job>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {JOB_COLUMNS} FROM sync_jobs WHERE status = 'pending'
                 ORDER BY created_at ASC, id ASC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt.query_map(params![limit], map_job_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn fail_stale_running(
        &self,
        started_before: i64,
        message: &str,
        now: i64,
    ) -> DomainResult<Vec<i64>> {
        let db = Arc::clone(&self.db);
        let message = message.to_string();

        task::spawn_blocking(move || -> DomainResult<Vec<i64>> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let ids = {
                let mut stmt = tx
                    .prepare(
                        "UPDATE sync_jobs SET status = 'failed', error_message = ?2, completed_at = ?3
                         WHERE status = 'running' AND started_at < ?1
                         RETURNING id",
                    )
                    .map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(params![started_before, message, now], |row| row.get::<_, i64>(0))
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)?
            };
            tx.commit().map_err(map_sql_error)?;
            Ok(ids)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL Operations (synchronous)
// ============================================================================

fn insert_job(conn: &Connection, job: &NewJob, created_at: i64) -> DomainResult<Job> {
    conn.execute(
        "INSERT INTO sync_jobs (company_id, job_type, from_date, to_date, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        params![
            job.company_id,
            job.job_type.to_string(),
            job.from_date.to_string(),
            job.to_date.to_string(),
            created_at,
        ],
    )
    .map_err(map_sql_error)?;

    Ok(Job {
        id: conn.last_insert_rowid(),
        company_id: job.company_id,
        job_type: job.job_type,
        from_date: job.from_date,
        to_date: job.to_date,
        status: JobStatus::Pending,
        started_at: None,
        completed_at: None,
        error_message: None,
        results: None,
        created_at,
    })
}

fn query_job(conn: &Connection, job_id: i64) -> DomainResult<Option<Job>> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM sync_jobs WHERE id = ?1");
    conn.query_row(&sql, params![job_id], map_job_row).optional().map_err(map_sql_error)
}

fn ensure_transitioned(updated: usize, job_id: i64, to: JobStatus) -> DomainResult<()> {
    if updated == 1 {
        Ok(())
    } else {
        Err(SyncError::InvalidState(format!("job {job_id} is not running; cannot mark {to}")))
    }
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let results_json: Option<String> = row.get(9)?;
    let results = results_json
        .map(|json| serde_json::from_str::<SyncResults>(&json))
        .transpose()
        .map_err(|err| conversion_error(9, err))?;

    Ok(Job {
        id: row.get(0)?,
        company_id: row.get(1)?,
        job_type: parse_column::<JobType>(row, 2)?,
        from_date: parse_date(row, 3)?,
        to_date: parse_date(row, 4)?,
        status: parse_column::<JobStatus>(row, 5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        error_message: row.get(8)?,
        results,
        created_at: row.get(10)?,
    })
}

pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|message| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
    })
}

fn parse_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|err| conversion_error(idx, err))
}

pub(crate) fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}
