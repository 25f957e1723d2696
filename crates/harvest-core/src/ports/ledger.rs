//! Ledger port - 実行履歴（cron_jobs）の正本
//!
//! create / update は orchestrator 専用、list 系は運用ツール向けです。

use async_trait::async_trait;

use crate::domain::{
    JobExecution, JobId, LedgerError, NewJobExecution, StatusCounts, StatusUpdate,
};

/// Durable record of job executions.
///
/// # 設計原則
/// - `(job_name, job_date, params_hash)` の一意性は create 時に検査する
///   （重複なら `LedgerError::Duplicate`）
/// - terminal な行・上限超えの retry_count は `LedgerError::UpdateRejected`、存在しない行は `NotFound`
/// - update は autocommit（retry 判断との原子性は要求しない）
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Insert a pending row.
    async fn create(&self, new: NewJobExecution) -> Result<JobExecution, LedgerError>;

    /// Apply a status transition to a non-terminal row.
    async fn update(&self, job_id: JobId, update: StatusUpdate) -> Result<(), LedgerError>;

    async fn get(&self, job_id: JobId) -> Result<Option<JobExecution>, LedgerError>;

    /// Newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<JobExecution>, LedgerError>;

    /// Rows not yet finished (including failed ones), oldest first.
    async fn list_unfinished(&self, job_name: Option<&str>)
    -> Result<Vec<JobExecution>, LedgerError>;

    async fn counts_by_status(&self) -> Result<StatusCounts, LedgerError>;
}
