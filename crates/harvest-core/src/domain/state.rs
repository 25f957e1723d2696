//! State - ledger row の状態
//!
//! State transitions:
//! - Pending -> Running -> Finished
//! - Pending -> Running -> Retrying -> ... -> Finished | Failed
//! - Pending -> Running -> Failed (store failure, or max_retries = 0)
//! - Pending -> Retrying (the running write was lost)
//!
//! Finished / Failed are terminal: no transition leaves them.
//! Both ledgers reject any update `can_transition_to` does not allow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a job execution as persisted in `cron_jobs.job_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Row created by a trigger fire, no attempt started yet.
    Pending,

    /// First attempt in flight.
    Running,

    /// A previous attempt failed; waiting for or executing a retry.
    Retrying,

    /// Fetched and stored successfully.
    Finished,

    /// Gave up (retries exhausted, or storage failed).
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Retrying,
        JobStatus::Finished,
        JobStatus::Failed,
    ];

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// Whether the orchestrator may move a row from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Retrying) => true,
            (Running, Running) | (Running, Retrying) => true,
            (Retrying, Retrying) => true,
            (Pending | Running | Retrying, Finished | Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Retrying => "retrying",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "retrying" => Ok(JobStatus::Retrying),
            "finished" => Ok(JobStatus::Finished),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}
