use async_trait::async_trait;
use rusqlite::{ErrorCode, OptionalExtension, Row, params};
use tracing::debug;

use super::{Database, format_ts, parse_ts, run_blocking};
use crate::domain::params::{format_date, params_hash, parse_date};
use crate::domain::{
    JobExecution, JobId, JobParams, JobStatus, LedgerError, NewJobExecution, StatusCounts,
    StatusUpdate,
};
use crate::ports::Ledger;

const SELECT_COLUMNS: &str = "job_id, job_name, job_date, job_params, job_params_hash, job_status,
     message, execution_time_ms, retry_count, max_retries, created_at, updated_at, finished_at";

/// Execution ledger backed by the `cron_jobs` table.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    db: Database,
}

impl SqliteLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn create_blocking(&self, new: NewJobExecution) -> Result<JobExecution, LedgerError> {
        let params_json = new
            .params
            .to_json()
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        let hash = params_hash(&params_json);
        let job_name = new.job_name();
        let job_date = format_date(new.job_date());
        let now = format_ts(new.created_at);

        let inserted = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cron_jobs
                 (job_name, job_date, job_params, job_params_hash, job_status,
                  execution_time_ms, retry_count, max_retries, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', 0, 0, ?5, ?6, ?6)",
                params![job_name, job_date, params_json, hash, new.max_retries, now],
            )?;
            Ok(conn.last_insert_rowid())
        });

        let job_id = match inserted {
            Ok(id) => JobId::new(id),
            Err(e) if is_unique_violation(&e) => {
                return Err(LedgerError::Duplicate {
                    job_name: job_name.to_string(),
                    job_date,
                });
            }
            Err(e) => return Err(e.into()),
        };

        debug!(%job_id, job_name, %job_date, "ledger row created");

        Ok(JobExecution {
            job_id,
            job_name: job_name.to_string(),
            job_date: new.job_date(),
            job_params: new.params,
            job_params_hash: hash,
            job_status: JobStatus::Pending,
            message: None,
            execution_time_ms: 0,
            retry_count: 0,
            max_retries: new.max_retries,
            created_at: new.created_at,
            updated_at: new.created_at,
            finished_at: None,
        })
    }

    fn update_blocking(&self, job_id: JobId, update: StatusUpdate) -> Result<(), LedgerError> {
        let status = update.status.as_str();
        let at = format_ts(update.at);
        let finished_at = update.finished_at().map(format_ts);
        let exec_ms = i64::try_from(update.execution_time_ms).unwrap_or(i64::MAX);
        let allowed_from: Vec<&str> = JobStatus::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(update.status))
            .map(JobStatus::as_str)
            .collect();
        let allowed_from =
            serde_json::to_string(&allowed_from).map_err(|e| LedgerError::Storage(e.to_string()))?;

        // Only rows whose current status may move to the target match; non-terminal
        // targets must also stay within max_retries.
        let n = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE cron_jobs
                 SET job_status = ?1,
                     message = COALESCE(?2, message),
                     execution_time_ms = ?3,
                     retry_count = ?4,
                     updated_at = ?5,
                     finished_at = ?6
                 WHERE job_id = ?7
                   AND job_status IN (SELECT value FROM json_each(?8))
                   AND (?1 IN ('finished', 'failed') OR ?4 <= max_retries)",
                params![
                    status,
                    update.message,
                    exec_ms,
                    update.retry_count,
                    at,
                    finished_at,
                    job_id.get(),
                    allowed_from
                ],
            )
        })?;

        if n == 0 {
            let exists = self.db.with_conn(|conn| {
                conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cron_jobs WHERE job_id = ?1)",
                    [job_id.get()],
                    |row| row.get::<_, bool>(0),
                )
            })?;
            return Err(if exists {
                LedgerError::UpdateRejected(job_id)
            } else {
                LedgerError::NotFound(job_id)
            });
        }
        Ok(())
    }

    fn get_blocking(&self, job_id: JobId) -> Result<Option<JobExecution>, LedgerError> {
        let raw = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM cron_jobs WHERE job_id = ?1"),
                [job_id.get()],
                RawRow::from_row,
            )
            .optional()
        })?;
        raw.map(RawRow::decode).transpose()
    }

    fn query_rows(
        &self,
        sql: &str,
        bind: impl rusqlite::Params,
    ) -> Result<Vec<JobExecution>, LedgerError> {
        let raws = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt
                .query_map(bind, RawRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        raws.into_iter().map(RawRow::decode).collect()
    }

    fn counts_blocking(&self) -> Result<StatusCounts, LedgerError> {
        let rows: Vec<(String, i64)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT job_status, COUNT(*) FROM cron_jobs GROUP BY job_status",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            let status: JobStatus = status.parse().map_err(LedgerError::Decode)?;
            counts.add(status, n as usize);
        }
        Ok(counts)
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn create(&self, new: NewJobExecution) -> Result<JobExecution, LedgerError> {
        let this = self.clone();
        run_blocking(move || this.create_blocking(new)).await
    }

    async fn update(&self, job_id: JobId, update: StatusUpdate) -> Result<(), LedgerError> {
        let this = self.clone();
        run_blocking(move || this.update_blocking(job_id, update)).await
    }

    async fn get(&self, job_id: JobId) -> Result<Option<JobExecution>, LedgerError> {
        let this = self.clone();
        run_blocking(move || this.get_blocking(job_id)).await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<JobExecution>, LedgerError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let this = self.clone();
        run_blocking(move || {
            this.query_rows(
                &format!("SELECT {SELECT_COLUMNS} FROM cron_jobs ORDER BY job_id DESC LIMIT ?1"),
                [limit],
            )
        })
        .await
    }

    async fn list_unfinished(
        &self,
        job_name: Option<&str>,
    ) -> Result<Vec<JobExecution>, LedgerError> {
        let job_name = job_name.map(str::to_owned);
        let this = self.clone();
        run_blocking(move || {
            this.query_rows(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM cron_jobs
                     WHERE job_status <> 'finished' AND (?1 IS NULL OR job_name = ?1)
                     ORDER BY job_id ASC"
                ),
                [job_name],
            )
        })
        .await
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, LedgerError> {
        let this = self.clone();
        run_blocking(move || this.counts_blocking()).await
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Column values as stored, before domain decoding.
struct RawRow {
    job_id: i64,
    job_name: String,
    job_date: String,
    job_params: String,
    job_params_hash: String,
    job_status: String,
    message: Option<String>,
    execution_time_ms: i64,
    retry_count: u32,
    max_retries: u32,
    created_at: String,
    updated_at: String,
    finished_at: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: row.get(0)?,
            job_name: row.get(1)?,
            job_date: row.get(2)?,
            job_params: row.get(3)?,
            job_params_hash: row.get(4)?,
            job_status: row.get(5)?,
            message: row.get(6)?,
            execution_time_ms: row.get(7)?,
            retry_count: row.get(8)?,
            max_retries: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
            finished_at: row.get(12)?,
        })
    }

    fn decode(self) -> Result<JobExecution, LedgerError> {
        let job_params = JobParams::from_json(&self.job_params)
            .map_err(|e| LedgerError::Decode(format!("job_params of job-{}: {e}", self.job_id)))?;
        let job_date = parse_date(&self.job_date)
            .map_err(|e| LedgerError::Decode(format!("job_date {:?}: {e}", self.job_date)))?;
        let job_status: JobStatus = self.job_status.parse().map_err(LedgerError::Decode)?;

        Ok(JobExecution {
            job_id: JobId::new(self.job_id),
            job_name: self.job_name,
            job_date,
            job_params,
            job_params_hash: self.job_params_hash,
            job_status,
            message: self.message,
            execution_time_ms: self.execution_time_ms.max(0) as u64,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            finished_at: self.finished_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GolfSite, InvoiceParams, ReservationParams};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn ledger() -> SqliteLedger {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        SqliteLedger::new(db)
    }

    fn t(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, min, 0).unwrap()
    }

    fn invoice_job(day: u32) -> NewJobExecution {
        let params = InvoiceParams {
            job_date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
        };
        NewJobExecution::new(params.into(), 3, t(0))
    }

    #[tokio::test]
    async fn create_then_get_roundtrips_the_row() {
        let ledger = ledger();
        let created = ledger.create(invoice_job(1)).await.unwrap();

        let fetched = ledger.get(created.job_id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.job_status, JobStatus::Pending);
        assert_eq!(fetched.job_name, "funeral_invoice");
        assert!(fetched.finished_at.is_none());
    }

    #[tokio::test]
    async fn duplicate_logical_submission_is_rejected_at_create() {
        let ledger = ledger();
        ledger.create(invoice_job(1)).await.unwrap();

        let err = ledger.create(invoice_job(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Duplicate { ref job_date, .. } if job_date == "2025-06-01"));

        // different date is a different logical job
        ledger.create(invoice_job(2)).await.unwrap();
    }

    #[tokio::test]
    async fn params_hash_separates_sites_on_the_same_date() {
        let ledger = ledger();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        for site in GolfSite::ALL {
            let params = ReservationParams { site, job_date: date };
            ledger
                .create(NewJobExecution::new(params.into(), 3, t(0)))
                .await
                .unwrap();
        }
        assert_eq!(ledger.list_recent(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn terminal_rows_are_never_updated_again() {
        let ledger = ledger();
        let row = ledger.create(invoice_job(1)).await.unwrap();

        ledger
            .update(row.job_id, StatusUpdate::new(JobStatus::Running, 0, 0, t(1)))
            .await
            .unwrap();
        ledger
            .update(
                row.job_id,
                StatusUpdate::new(JobStatus::Finished, 0, 120, t(2)).with_message("ok"),
            )
            .await
            .unwrap();

        let err = ledger
            .update(row.job_id, StatusUpdate::new(JobStatus::Failed, 0, 130, t(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UpdateRejected(id) if id == row.job_id));

        let stored = ledger.get(row.job_id).await.unwrap().unwrap();
        assert_eq!(stored.job_status, JobStatus::Finished);
        assert_eq!(stored.finished_at, Some(t(2)));
        assert_eq!(stored.execution_time_ms, 120);
        assert_eq!(stored.message.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn backward_transitions_are_rejected() {
        let ledger = ledger();
        let row = ledger.create(invoice_job(1)).await.unwrap();
        ledger
            .update(row.job_id, StatusUpdate::new(JobStatus::Retrying, 1, 0, t(1)))
            .await
            .unwrap();

        let err = ledger
            .update(row.job_id, StatusUpdate::new(JobStatus::Running, 1, 0, t(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UpdateRejected(_)));
        assert_eq!(
            ledger.get(row.job_id).await.unwrap().unwrap().job_status,
            JobStatus::Retrying
        );
    }

    #[tokio::test]
    async fn retry_count_cannot_exceed_ceiling_while_non_terminal() {
        let ledger = ledger();
        let row = ledger.create(invoice_job(1)).await.unwrap();

        let err = ledger
            .update(row.job_id, StatusUpdate::new(JobStatus::Retrying, 4, 0, t(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UpdateRejected(_)));
    }

    #[tokio::test]
    async fn updating_a_missing_row_is_not_found() {
        let ledger = ledger();
        let err = ledger
            .update(JobId::new(404), StatusUpdate::new(JobStatus::Running, 0, 0, t(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(id) if id.get() == 404));
    }

    #[tokio::test]
    async fn message_is_kept_when_update_has_none() {
        let ledger = ledger();
        let row = ledger.create(invoice_job(1)).await.unwrap();
        ledger
            .update(
                row.job_id,
                StatusUpdate::new(JobStatus::Retrying, 0, 5, t(1)).with_message("ORA-12541"),
            )
            .await
            .unwrap();
        ledger
            .update(row.job_id, StatusUpdate::new(JobStatus::Retrying, 1, 5, t(2)))
            .await
            .unwrap();

        let stored = ledger.get(row.job_id).await.unwrap().unwrap();
        assert_eq!(stored.message.as_deref(), Some("ORA-12541"));
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_limited() {
        let ledger = ledger();
        for day in 1..=5 {
            ledger.create(invoice_job(day)).await.unwrap();
        }

        let recent = ledger.list_recent(3).await.unwrap();
        let days: Vec<String> = recent.iter().map(|r| format_date(r.job_date)).collect();
        assert_eq!(days, vec!["2025-06-05", "2025-06-04", "2025-06-03"]);
    }

    #[tokio::test]
    async fn unfinished_and_counts_reflect_status() {
        let ledger = ledger();
        let a = ledger.create(invoice_job(1)).await.unwrap();
        let b = ledger.create(invoice_job(2)).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        ledger
            .create(NewJobExecution::new(
                ReservationParams { site: GolfSite::Gc, job_date: date }.into(),
                3,
                t(0),
            ))
            .await
            .unwrap();

        ledger
            .update(a.job_id, StatusUpdate::new(JobStatus::Finished, 0, 1, t(1)))
            .await
            .unwrap();
        ledger
            .update(b.job_id, StatusUpdate::new(JobStatus::Failed, 3, 1, t(1)))
            .await
            .unwrap();

        let unfinished = ledger.list_unfinished(Some("funeral_invoice")).await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].job_id, b.job_id);
        assert_eq!(ledger.list_unfinished(None).await.unwrap().len(), 2);

        let counts = ledger.counts_by_status().await.unwrap();
        assert_eq!(counts.finished, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.pending, 1);
    }

    #[tokio::test]
    async fn create_without_schema_is_a_storage_error() {
        let ledger = SqliteLedger::new(Database::open_in_memory().unwrap());
        let err = ledger.create(invoice_job(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(ref m) if m.contains("no such table")));
    }
}
