//! Errors - エラー型と分類
//!
//! ErrorKind は運用上の分類です：
//! - Transient: 一時的なエラー（リトライする）
//! - Permanent: 恒久的なエラー（リトライしない）
//! - Infrastructure: ledger / DB の障害

use thiserror::Error;

use super::ids::JobId;
use super::state::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// `err` followed by each of its sources, joined with `": "`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Remote fetch failed. Always retried by the orchestrator.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transient
    }
}

/// Writing fetched records failed. The batch was rolled back.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Permanent
    }
}

/// Ledger read/write failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("execution already submitted: job_name={job_name} job_date={job_date}")]
    Duplicate { job_name: String, job_date: String },

    #[error("{0} not found")]
    NotFound(JobId),

    #[error("{0}: update rejected (transition not allowed, or past its retry ceiling)")]
    UpdateRejected(JobId),

    #[error("ledger storage error: {0}")]
    Storage(String),

    #[error("ledger row could not be decoded: {0}")]
    Decode(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Infrastructure
    }
}

/// Errors surfaced by the engine to its caller.
///
/// Recorded job failures (fetch exhausted, store failed) are not errors at
/// this level; they come back as a failed [`JobOutcome`](super::JobOutcome).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("no job registered under name={0}")]
    UnknownJob(String),

    #[error("{job_id} is {status}; only pending, running or retrying rows can be resumed")]
    NotResumable { job_id: JobId, status: JobStatus },

    #[error("{job_id} holds {job_name} params, not the ones this job takes")]
    ParamsMismatch { job_id: JobId, job_name: String },

    #[error("trigger: {0}")]
    Trigger(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Ledger(e) => e.kind(),
            EngineError::UnknownJob(_)
            | EngineError::NotResumable { .. }
            | EngineError::ParamsMismatch { .. } => ErrorKind::Permanent,
            EngineError::Trigger(_) => ErrorKind::Infrastructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn fetch_error_keeps_its_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timeout");
        let err = FetchError::with_source("calling GOBO_P_UIBF062_V", io);
        assert_eq!(err.to_string(), "calling GOBO_P_UIBF062_V");
        assert!(err.source().is_some());
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn error_chain_includes_every_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory");
        let err = FetchError::with_source("reading exports/funeral_invoice/2025-06-01.json", io);
        assert_eq!(
            error_chain(&err),
            "reading exports/funeral_invoice/2025-06-01.json: No such file or directory"
        );
        assert_eq!(error_chain(&FetchError::new("timeout")), "timeout");
    }

    #[test]
    fn engine_error_kind_follows_the_ledger() {
        let err = EngineError::from(LedgerError::Storage("disk I/O error".into()));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(err.to_string().contains("disk I/O error"));
    }
}
