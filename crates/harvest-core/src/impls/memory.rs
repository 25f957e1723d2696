//! In-memory ledger and sink (開発用・テスト用)
//!
//! SQLite 実装と同じ契約を守ります：
//! - 一意性は create 時に検査
//! - `JobStatus::can_transition_to` が許さない遷移は拒否（terminal な行は更新不可）
//! - sink は natural key で重複を捨て、バッチ単位で all-or-nothing

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::params::{format_date, params_hash};
use crate::domain::{
    FetchedRecord, JobExecution, JobId, JobStatus, LedgerError, NewJobExecution, StatusCounts,
    StatusUpdate, StoreError,
};
use crate::ports::{Ledger, RecordSink};

#[derive(Default)]
struct LedgerState {
    rows: BTreeMap<JobId, JobExecution>,
    next_id: i64,
}

/// Ledger kept in a `BTreeMap` keyed by job id.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create(&self, new: NewJobExecution) -> Result<JobExecution, LedgerError> {
        let params_json = new
            .params
            .to_json()
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        let hash = params_hash(&params_json);
        let job_name = new.job_name();
        let job_date = new.job_date();

        let mut state = self.lock();
        let duplicate = state.rows.values().any(|row| {
            row.job_name == job_name && row.job_date == job_date && row.job_params_hash == hash
        });
        if duplicate {
            return Err(LedgerError::Duplicate {
                job_name: job_name.to_string(),
                job_date: format_date(job_date),
            });
        }

        state.next_id += 1;
        let row = JobExecution {
            job_id: JobId::new(state.next_id),
            job_name: job_name.to_string(),
            job_date,
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
        };
        state.rows.insert(row.job_id, row.clone());
        Ok(row)
    }

    async fn update(&self, job_id: JobId, update: StatusUpdate) -> Result<(), LedgerError> {
        let mut state = self.lock();
        let Some(row) = state.rows.get_mut(&job_id) else {
            return Err(LedgerError::NotFound(job_id));
        };
        if !row.job_status.can_transition_to(update.status)
            || (!update.status.is_terminal() && update.retry_count > row.max_retries)
        {
            return Err(LedgerError::UpdateRejected(job_id));
        }

        row.finished_at = update.finished_at();
        row.job_status = update.status;
        if update.message.is_some() {
            row.message = update.message;
        }
        row.execution_time_ms = update.execution_time_ms;
        row.retry_count = update.retry_count;
        row.updated_at = update.at;
        Ok(())
    }

    async fn get(&self, job_id: JobId) -> Result<Option<JobExecution>, LedgerError> {
        Ok(self.lock().rows.get(&job_id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<JobExecution>, LedgerError> {
        Ok(self.lock().rows.values().rev().take(limit).cloned().collect())
    }

    async fn list_unfinished(
        &self,
        job_name: Option<&str>,
    ) -> Result<Vec<JobExecution>, LedgerError> {
        Ok(self
            .lock()
            .rows
            .values()
            .filter(|row| row.job_status != JobStatus::Finished)
            .filter(|row| job_name.is_none_or(|name| row.job_name == name))
            .cloned()
            .collect())
    }

    async fn counts_by_status(&self) -> Result<StatusCounts, LedgerError> {
        let mut counts = StatusCounts::default();
        for row in self.lock().rows.values() {
            counts.add(row.job_status, 1);
        }
        Ok(counts)
    }
}

/// Record sink holding rows in a `Vec`, deduplicated by natural key.
pub struct InMemorySink<R: FetchedRecord> {
    rows: Mutex<(Vec<R>, HashSet<R::Key>)>,
}

impl<R: FetchedRecord> InMemorySink<R> {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new((Vec::new(), HashSet::new())),
        }
    }

    pub fn rows(&self) -> Vec<R> {
        self.rows.lock().unwrap_or_else(|e| e.into_inner()).0.clone()
    }
}

impl<R: FetchedRecord> Default for InMemorySink<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: FetchedRecord> RecordSink<R> for InMemorySink<R> {
    async fn store(&self, records: &[R]) -> Result<usize, StoreError> {
        let mut guard = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        let (rows, keys) = &mut *guard;

        // 先に全件検査してから反映する（途中失敗が見えないように）
        let mut fresh = Vec::new();
        let mut batch_keys = HashSet::new();
        for record in records {
            let key = record.natural_key();
            if !keys.contains(&key) && batch_keys.insert(key.clone()) {
                fresh.push((key, record.clone()));
            }
        }

        let inserted = fresh.len();
        for (key, record) in fresh {
            keys.insert(key);
            rows.push(record);
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FuneralInvoice, InvoiceParams};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn new_job(day: u32) -> NewJobExecution {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let params = InvoiceParams {
            job_date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
        };
        NewJobExecution::new(params.into(), 3, at)
    }

    #[tokio::test]
    async fn ledger_matches_sqlite_contract() {
        let ledger = InMemoryLedger::new();
        let a = ledger.create(new_job(1)).await.unwrap();
        let b = ledger.create(new_job(2)).await.unwrap();
        assert!(b.job_id > a.job_id);
        assert!(matches!(
            ledger.create(new_job(1)).await,
            Err(LedgerError::Duplicate { .. })
        ));

        let at = Utc::now();
        ledger
            .update(a.job_id, StatusUpdate::new(JobStatus::Failed, 3, 10, at))
            .await
            .unwrap();
        assert!(matches!(
            ledger
                .update(a.job_id, StatusUpdate::new(JobStatus::Finished, 3, 10, at))
                .await,
            Err(LedgerError::UpdateRejected(_))
        ));

        assert!(matches!(
            ledger
                .update(JobId::new(99), StatusUpdate::new(JobStatus::Running, 0, 0, at))
                .await,
            Err(LedgerError::NotFound(_))
        ));

        ledger
            .update(b.job_id, StatusUpdate::new(JobStatus::Retrying, 1, 10, at))
            .await
            .unwrap();
        assert!(matches!(
            ledger
                .update(b.job_id, StatusUpdate::new(JobStatus::Running, 1, 10, at))
                .await,
            Err(LedgerError::UpdateRejected(_))
        ));

        let recent = ledger.list_recent(1).await.unwrap();
        assert_eq!(recent[0].job_id, b.job_id);
        assert_eq!(ledger.list_unfinished(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sink_dedups_within_and_across_batches() {
        let sink = InMemorySink::<FuneralInvoice>::new();
        let d = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let inv = |c: &str| FuneralInvoice { invoice_date: d, customer_id: c.into(), total_amount: 1 };

        assert_eq!(sink.store(&[inv("A"), inv("A"), inv("B")]).await.unwrap(), 2);
        assert_eq!(sink.store(&[inv("A"), inv("C")]).await.unwrap(), 1);
        assert_eq!(sink.rows().len(), 3);
    }
}
