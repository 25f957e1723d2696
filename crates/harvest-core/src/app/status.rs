//! Status - ledger の照会ビュー
//!
//! 復旧は手動です。ここで見えた pending / running / retrying の行は、
//! 運用者が `TriggerRegistrar::resume`（CLI `resume <job_id>`）で同じ行のまま
//! 最後まで運びます。failed は terminal なので調査用に残ります。

use serde::Serialize;

use crate::domain::{JobExecution, LedgerError, StatusCounts};
use crate::ports::Ledger;

/// Snapshot of the ledger for dashboards and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub counts: StatusCounts,
    /// Not finished, oldest first.
    pub unfinished: Vec<JobExecution>,
    /// Newest first.
    pub recent: Vec<JobExecution>,
}

impl LedgerStatus {
    pub async fn collect(
        ledger: &dyn Ledger,
        job_name: Option<&str>,
        recent_limit: usize,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            counts: ledger.counts_by_status().await?,
            unfinished: ledger.list_unfinished(job_name).await?,
            recent: ledger.list_recent(recent_limit).await?,
        })
    }

    /// True when no listed row needs manual attention.
    pub fn is_clean(&self) -> bool {
        self.unfinished.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InvoiceParams, JobStatus, NewJobExecution, StatusUpdate};
    use crate::impls::InMemoryLedger;
    use chrono::{NaiveDate, Utc};

    #[tokio::test]
    async fn collects_counts_and_unfinished_rows() {
        let ledger = InMemoryLedger::new();
        let at = Utc::now();
        for day in 1..=3 {
            let params = InvoiceParams {
                job_date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            };
            let row = ledger
                .create(NewJobExecution::new(params.into(), 3, at))
                .await
                .unwrap();
            if day == 1 {
                ledger
                    .update(row.job_id, StatusUpdate::new(JobStatus::Finished, 0, 5, at))
                    .await
                    .unwrap();
            }
        }

        let status = LedgerStatus::collect(&ledger, None, 2).await.unwrap();
        assert_eq!(status.counts.finished, 1);
        assert_eq!(status.counts.pending, 2);
        assert_eq!(status.unfinished.len(), 2);
        assert_eq!(status.recent.len(), 2);
        assert!(!status.is_clean());
    }
}
