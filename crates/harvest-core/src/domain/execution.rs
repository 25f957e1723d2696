//! Ledger row model (`cron_jobs`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::params::JobParams;
use super::state::JobStatus;

/// Ceiling on retries when the caller does not specify one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// One row of the execution ledger.
///
/// Invariants (kept by the ledger implementations):
/// - `retry_count <= max_retries` while the row is not terminal
/// - `finished_at.is_some()` iff `status.is_terminal()`
/// - status only moves along [`JobStatus::can_transition_to`], so a terminal
///   row is never updated again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub job_id: JobId,
    pub job_name: String,
    pub job_date: NaiveDate,
    pub job_params: JobParams,
    pub job_params_hash: String,
    pub job_status: JobStatus,
    pub message: Option<String>,
    pub execution_time_ms: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Everything needed to insert a fresh (pending) ledger row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJobExecution {
    pub params: JobParams,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
}

impl NewJobExecution {
    pub fn new(params: JobParams, max_retries: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            params,
            max_retries,
            created_at,
        }
    }

    pub fn job_name(&self) -> &'static str {
        self.params.job_name()
    }

    pub fn job_date(&self) -> NaiveDate {
        self.params.job_date()
    }
}

/// A status transition written by the orchestrator.
///
/// `finished_at` is derived from `status` by the ledger, never set by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: JobStatus,
    pub message: Option<String>,
    pub execution_time_ms: u64,
    pub retry_count: u32,
    pub at: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(status: JobStatus, retry_count: u32, execution_time_ms: u64, at: DateTime<Utc>) -> Self {
        Self {
            status,
            message: None,
            execution_time_ms,
            retry_count,
            at,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.status.is_terminal().then_some(self.at)
    }
}

/// Row counts per status (dashboard view of the ledger).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub retrying: usize,
    pub finished: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: JobStatus, n: usize) {
        match status {
            JobStatus::Pending => self.pending += n,
            JobStatus::Running => self.running += n,
            JobStatus::Retrying => self.retrying += n,
            JobStatus::Finished => self.finished += n,
            JobStatus::Failed => self.failed += n,
        }
    }
}
