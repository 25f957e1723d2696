//! TriggerRegistrar - ジョブ名と schedule の結び付け
//!
//! # 流れ
//! 1. `register(job_name, schedule, date_rule)` で TriggerMechanism に callback を登録
//! 2. fire のたびに FireId を採番し、Clock から論理日付を解決
//! 3. DynJob が params の列に展開し、orchestrator を並行に実行
//!
//! 手動復旧は `resume(job_id)`：ledger 行の job_name から DynJob を引き、
//! 既存の未完了行をそのまま最後まで運びます（新しい行は作りません）。
//!
//! registrar は `EngineBuilder::build` からしか得られません。
//! build がスキーマ初期化を済ませてから返すので、登録前に必ずテーブルがあります。

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};

use super::RetryOrchestrator;
use crate::domain::{EngineError, JobId, JobOutcome, LedgerError};
use crate::ports::{TriggerCallback, TriggerFuture, TriggerMechanism};
use crate::typed::{DynJob, JobRegistry};

/// Which logical date a fire processes, relative to "today" in the
/// configured UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRule {
    #[default]
    Today,
    Yesterday,
    DaysAgo(u32),
}

impl DateRule {
    pub fn resolve(self, now: DateTime<Utc>, utc_offset: FixedOffset) -> NaiveDate {
        let today = now.with_timezone(&utc_offset).date_naive();
        let back = match self {
            DateRule::Today => 0,
            DateRule::Yesterday => 1,
            DateRule::DaysAgo(n) => n,
        };
        today
            .checked_sub_days(Days::new(u64::from(back)))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// One registration, as listed by [`TriggerRegistrar::entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerEntry {
    pub job_name: String,
    pub schedule: String,
    pub date_rule: DateRule,
}

pub struct TriggerRegistrar {
    orchestrator: Arc<RetryOrchestrator>,
    jobs: JobRegistry,
    trigger: Arc<dyn TriggerMechanism>,
    entries: Mutex<Vec<TriggerEntry>>,
    max_retries: u32,
    utc_offset: FixedOffset,
}

impl TriggerRegistrar {
    pub(crate) fn new(
        orchestrator: Arc<RetryOrchestrator>,
        jobs: JobRegistry,
        trigger: Arc<dyn TriggerMechanism>,
        max_retries: u32,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            orchestrator,
            jobs,
            trigger,
            entries: Mutex::new(Vec::new()),
            max_retries,
            utc_offset,
        }
    }

    pub fn orchestrator(&self) -> &Arc<RetryOrchestrator> {
        &self.orchestrator
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    fn job(&self, job_name: &str) -> Result<Arc<dyn DynJob>, EngineError> {
        self.jobs
            .get(job_name)
            .ok_or_else(|| EngineError::UnknownJob(job_name.to_string()))
    }

    /// Binds a registered job to a schedule expression.
    pub async fn register(
        &self,
        job_name: &str,
        schedule: &str,
        date_rule: DateRule,
    ) -> Result<(), EngineError> {
        let job = self.job(job_name)?;
        let orchestrator = self.orchestrator.clone();
        let max_retries = self.max_retries;
        let utc_offset = self.utc_offset;

        let callback: TriggerCallback = Arc::new(move || -> TriggerFuture {
            let job = job.clone();
            let orchestrator = orchestrator.clone();
            Box::pin(async move {
                let date = date_rule.resolve(orchestrator.clock().now(), utc_offset);
                fire(&orchestrator, job.as_ref(), date, max_retries).await;
            })
        });

        self.trigger
            .register(schedule, callback)
            .await
            .map_err(|e| EngineError::Trigger(e.to_string()))?;

        info!(job_name, schedule, ?date_rule, "job registered");
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(TriggerEntry {
                job_name: job_name.to_string(),
                schedule: schedule.to_string(),
                date_rule,
            });
        Ok(())
    }

    /// Runs a registered job for `date` right away, outside any schedule.
    pub async fn run_now(
        &self,
        job_name: &str,
        date: NaiveDate,
    ) -> Result<Vec<Result<JobOutcome, EngineError>>, EngineError> {
        let job = self.job(job_name)?;
        Ok(fire(&self.orchestrator, job.as_ref(), date, self.max_retries).await)
    }

    /// Drives an unfinished ledger row to a terminal status through the job
    /// that created it.
    pub async fn resume(&self, job_id: JobId) -> Result<JobOutcome, EngineError> {
        let row = self
            .orchestrator
            .ledger()
            .get(job_id)
            .await?
            .ok_or(LedgerError::NotFound(job_id))?;
        let job = self.job(&row.job_name)?;
        let span = info_span!("resume", %job_id, job_name = job.name());
        job.resume(&self.orchestrator, job_id).instrument(span).await
    }

    /// Today's date in the configured offset.
    pub fn today(&self) -> NaiveDate {
        DateRule::Today.resolve(self.orchestrator.clock().now(), self.utc_offset)
    }

    pub fn entries(&self) -> Vec<TriggerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn start(&self) -> Result<(), EngineError> {
        self.trigger
            .start()
            .await
            .map_err(|e| EngineError::Trigger(e.to_string()))
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.trigger
            .shutdown()
            .await
            .map_err(|e| EngineError::Trigger(e.to_string()))
    }
}

async fn fire(
    orchestrator: &RetryOrchestrator,
    job: &dyn DynJob,
    date: NaiveDate,
    max_retries: u32,
) -> Vec<Result<JobOutcome, EngineError>> {
    let fire_id = orchestrator.ids().generate_fire_id();
    let span = info_span!("fire", %fire_id, job_name = job.name(), %date);

    async move {
        info!("trigger fired");
        let results = job.run_for(orchestrator, date, max_retries).await;
        let finished = results
            .iter()
            .filter(|r| matches!(r, Ok(outcome) if outcome.is_success()))
            .count();
        if finished == results.len() {
            info!(executions = results.len(), "fire completed");
        } else {
            warn!(executions = results.len(), finished, "fire completed with failures");
        }
        results
    }
    .instrument(span)
    .await
}
