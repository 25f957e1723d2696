//! RetryOrchestrator - 1 つの論理ジョブを最後まで運ぶ
//!
//! create → (running | retrying) → fetch → store → finished / failed
//!
//! # 不変条件
//! - ledger 行は execution ごとに 1 行だけ作る（create 失敗なら fetch しない）
//! - fetch の失敗だけがリトライ対象。store の失敗は即 failed
//! - ledger の update 失敗は warn! を出して握りつぶす（ジョブ自体は続行）
//! - attempt は直列。backoff はこの task 上の tokio sleep
//! - `resume` は運用者が呼ぶ手動復旧。未完了（pending / running / retrying）の
//!   既存行を、記録された retry_count から同じループで最後まで運ぶ

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};

use crate::domain::params::format_date;
use crate::domain::{
    Decider, Decision, EngineError, JobExecution, JobId, JobOutcome, JobParams, JobStatus,
    LedgerError, NewJobExecution, StatusUpdate, error_chain,
};
use crate::ports::{Clock, DataSource, IdGenerator, Ledger, RecordSink};

pub struct RetryOrchestrator {
    ledger: Arc<dyn Ledger>,
    decider: Arc<dyn Decider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

/// The ledger row being driven, as far as the loop needs it.
struct Execution {
    job_id: JobId,
    job_name: String,
    job_date: String,
    max_retries: u32,
    retry_count: u32,
    status: JobStatus,
}

impl Execution {
    fn from_row(row: &JobExecution) -> Self {
        Self {
            job_id: row.job_id,
            job_name: row.job_name.clone(),
            job_date: format_date(row.job_date),
            max_retries: row.max_retries,
            retry_count: row.retry_count,
            status: row.job_status,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl RetryOrchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        decider: Arc<dyn Decider>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            ledger,
            decider,
            clock,
            ids,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    /// Runs one logical job to a terminal status.
    ///
    /// Returns `Err` only when the ledger row could not be created; every
    /// recorded outcome (including failures) is `Ok`.
    pub async fn execute<S, W>(
        &self,
        source: &S,
        sink: &W,
        params: S::Params,
        max_retries: u32,
    ) -> Result<JobOutcome, EngineError>
    where
        S: DataSource + ?Sized,
        W: RecordSink<S::Record> + ?Sized,
    {
        let job_params: JobParams = params.clone().into();
        let row = self
            .ledger
            .create(NewJobExecution::new(job_params, max_retries, self.clock.now()))
            .await?;
        let execution = Execution::from_row(&row);
        info!(
            job_id = %execution.job_id,
            job_name = %execution.job_name,
            job_date = %execution.job_date,
            max_retries,
            "job created"
        );
        Ok(self.drive(source, sink, params, execution).await)
    }

    /// Picks up an existing row that never reached a terminal status and
    /// runs it to one, starting from its recorded `retry_count`.
    ///
    /// Finished and failed rows are left untouched.
    pub async fn resume<S, W>(
        &self,
        source: &S,
        sink: &W,
        job_id: JobId,
    ) -> Result<JobOutcome, EngineError>
    where
        S: DataSource + ?Sized,
        W: RecordSink<S::Record> + ?Sized,
    {
        let row = self
            .ledger
            .get(job_id)
            .await?
            .ok_or(LedgerError::NotFound(job_id))?;
        if row.job_status.is_terminal() {
            return Err(EngineError::NotResumable {
                job_id,
                status: row.job_status,
            });
        }

        let execution = Execution::from_row(&row);
        let params = <S::Params as TryFrom<JobParams>>::try_from(row.job_params).map_err(
            |other| EngineError::ParamsMismatch {
                job_id,
                job_name: other.job_name().to_string(),
            },
        )?;
        info!(
            %job_id,
            job_name = %execution.job_name,
            job_date = %execution.job_date,
            status = %execution.status,
            retry_count = execution.retry_count,
            "job resumed"
        );
        Ok(self.drive(source, sink, params, execution).await)
    }

    async fn drive<S, W>(
        &self,
        source: &S,
        sink: &W,
        params: S::Params,
        execution: Execution,
    ) -> JobOutcome
    where
        S: DataSource + ?Sized,
        W: RecordSink<S::Record> + ?Sized,
    {
        let Execution {
            job_id,
            job_name,
            job_date,
            max_retries,
            mut retry_count,
            status: mut current,
        } = execution;
        let mut fetch_attempts: u32 = 0;
        let mut elapsed = Duration::ZERO;

        loop {
            fetch_attempts += 1;
            let attempt_id = self.ids.generate_attempt_id();
            let span = info_span!(
                "attempt",
                %job_id,
                job_name = %job_name,
                job_date = %job_date,
                attempt = fetch_attempts,
                retry_count,
                %attempt_id,
            );

            let status = if retry_count == 0 && current != JobStatus::Retrying {
                JobStatus::Running
            } else {
                JobStatus::Retrying
            };
            let update = StatusUpdate::new(status, retry_count, millis(elapsed), self.clock.now());
            self.record(job_id, update).await;

            let started = Instant::now();
            let fetched = source.fetch(&params).instrument(span.clone()).await;
            elapsed += started.elapsed();

            let records = match fetched {
                Ok(records) => records,
                Err(e) => {
                    let cause = error_chain(&e);
                    let failures = retry_count + 1;
                    match self.decider.decide(failures, max_retries) {
                        Decision::MarkFailed { reason } => {
                            let message = format!("fetch failed ({reason}): {cause}");
                            error!(parent: &span, error = %cause, kind = ?e.kind(), %reason, "fetch failed, giving up");
                            let update = StatusUpdate::new(
                                JobStatus::Failed,
                                retry_count,
                                millis(elapsed),
                                self.clock.now(),
                            )
                            .with_message(message.clone());
                            self.record(job_id, update).await;
                            return JobOutcome {
                                job_id,
                                job_name,
                                status: JobStatus::Failed,
                                retry_count,
                                fetch_attempts,
                                fetched: 0,
                                inserted: 0,
                                execution_time: elapsed,
                                message,
                            };
                        }
                        Decision::Retry { delay, reason } => {
                            warn!(parent: &span, error = %cause, kind = ?e.kind(), %reason, "fetch failed, will retry");
                            let update = StatusUpdate::new(
                                JobStatus::Retrying,
                                retry_count,
                                millis(elapsed),
                                self.clock.now(),
                            )
                            .with_message(format!("fetch failed: {cause}"));
                            self.record(job_id, update).await;
                            current = JobStatus::Retrying;
                            tokio::time::sleep(delay).await;
                            retry_count = failures;
                            continue;
                        }
                    }
                }
            };

            let fetched_count = records.len();
            let started = Instant::now();
            let stored = sink.store(&records).instrument(span.clone()).await;
            elapsed += started.elapsed();

            let (status, inserted, message) = match stored {
                Ok(inserted) => {
                    let message = format!("fetched {fetched_count} records, inserted {inserted}");
                    info!(parent: &span, fetched = fetched_count, inserted, "job finished");
                    (JobStatus::Finished, inserted, message)
                }
                Err(e) => {
                    let cause = error_chain(&e);
                    let message =
                        format!("fetched {fetched_count} records but storing failed: {cause}");
                    error!(parent: &span, error = %cause, kind = ?e.kind(), fetched = fetched_count, "store failed");
                    (JobStatus::Failed, 0, message)
                }
            };

            let update = StatusUpdate::new(status, retry_count, millis(elapsed), self.clock.now())
                .with_message(message.clone());
            self.record(job_id, update).await;

            return JobOutcome {
                job_id,
                job_name,
                status,
                retry_count,
                fetch_attempts,
                fetched: fetched_count,
                inserted,
                execution_time: elapsed,
                message,
            };
        }
    }

    /// Best-effort ledger write.
    async fn record(&self, job_id: JobId, update: StatusUpdate) {
        let status = update.status;
        if let Err(e) = self.ledger.update(job_id, update).await {
            warn!(%job_id, %status, error = %e, kind = ?e.kind(), "ledger update failed");
        }
    }
}
