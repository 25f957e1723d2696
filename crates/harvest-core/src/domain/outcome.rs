//! Outcome of one job execution, as returned to the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::state::JobStatus;

/// What a finished (or failed) execution did.
///
/// The same information is written to the ledger; this is the in-process
/// copy for the caller (trigger callback, CLI).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub job_name: String,
    /// Finished or Failed.
    pub status: JobStatus,
    /// Retry count as recorded in the ledger.
    pub retry_count: u32,
    /// Number of fetch calls made.
    pub fetch_attempts: u32,
    pub fetched: usize,
    pub inserted: usize,
    #[serde(with = "duration_ms")]
    pub execution_time: Duration,
    pub message: String,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Finished
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_time_as_millis() {
        let outcome = JobOutcome {
            job_id: JobId::new(9),
            job_name: "funeral_invoice".into(),
            status: JobStatus::Finished,
            retry_count: 0,
            fetch_attempts: 1,
            fetched: 3,
            inserted: 2,
            execution_time: Duration::from_millis(1500),
            message: "ok".into(),
        };
        let v = serde_json::to_value(&outcome).unwrap();
        assert_eq!(v["execution_time"], 1500);
        assert_eq!(v["status"], "finished");
        assert!(outcome.is_success());
    }
}
