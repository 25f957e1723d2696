//! Job - 型付きパイプラインと type erasure
//!
//! # 二層構造
//! - **表層（Typed）**: `Pipeline<S, W>` - DataSource と RecordSink の組を型で縛る
//! - **内部（Dyn）**: `DynJob` - object-safe。registrar は名前で引いて実行するだけ
//!
//! 1 回の fire は「論理日付 → params の列」に展開され、各 execution を
//! 並行に走らせます（invoice は 1 件、golf は site ごとに 1 件）。
//! site ごとに ledger 行も backoff も別なので、1 site の retry が
//! 他の site を待たせることはありません。

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future::join_all;
use tracing::warn;

use crate::app::RetryOrchestrator;
use crate::domain::params::{FUNERAL_INVOICE_JOB, GOLF_RESERVATION_JOB};
use crate::domain::{EngineError, GolfSite, InvoiceParams, JobId, JobOutcome, ReservationParams};
use crate::ports::{DataSource, RecordSink};

/// Expands a logical date into the parameter sets of one fire.
pub type Planner<P> = fn(NaiveDate) -> Vec<P>;

pub fn plan_invoice(job_date: NaiveDate) -> Vec<InvoiceParams> {
    vec![InvoiceParams { job_date }]
}

pub fn plan_reservation(job_date: NaiveDate) -> Vec<ReservationParams> {
    GolfSite::ALL
        .into_iter()
        .map(|site| ReservationParams { site, job_date })
        .collect()
}

/// Object-safe view of a pipeline.
#[async_trait]
pub trait DynJob: Send + Sync {
    fn name(&self) -> &str;

    /// Runs every parameter set of `date` concurrently. Results come back in
    /// plan order; one failing entry does not stop the rest.
    async fn run_for(
        &self,
        orchestrator: &RetryOrchestrator,
        date: NaiveDate,
        max_retries: u32,
    ) -> Vec<Result<JobOutcome, EngineError>>;

    /// Drives an unfinished ledger row of this job to a terminal status.
    async fn resume(
        &self,
        orchestrator: &RetryOrchestrator,
        job_id: JobId,
    ) -> Result<JobOutcome, EngineError>;
}

/// A fetch-then-store job over one source and one sink.
pub struct Pipeline<S, W>
where
    S: DataSource,
    W: RecordSink<S::Record>,
{
    name: String,
    source: S,
    sink: W,
    plan: Planner<S::Params>,
    _marker: PhantomData<fn() -> S::Record>,
}

impl<S, W> Pipeline<S, W>
where
    S: DataSource,
    W: RecordSink<S::Record>,
{
    pub fn new(name: impl Into<String>, source: S, sink: W, plan: Planner<S::Params>) -> Self {
        Self {
            name: name.into(),
            source,
            sink,
            plan,
            _marker: PhantomData,
        }
    }
}

impl<S, W> Pipeline<S, W>
where
    S: DataSource<Params = InvoiceParams>,
    W: RecordSink<S::Record>,
{
    pub fn funeral_invoice(source: S, sink: W) -> Self {
        Self::new(FUNERAL_INVOICE_JOB, source, sink, plan_invoice)
    }
}

impl<S, W> Pipeline<S, W>
where
    S: DataSource<Params = ReservationParams>,
    W: RecordSink<S::Record>,
{
    pub fn golf_reservation(source: S, sink: W) -> Self {
        Self::new(GOLF_RESERVATION_JOB, source, sink, plan_reservation)
    }
}

#[async_trait]
impl<S, W> DynJob for Pipeline<S, W>
where
    S: DataSource,
    W: RecordSink<S::Record>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_for(
        &self,
        orchestrator: &RetryOrchestrator,
        date: NaiveDate,
        max_retries: u32,
    ) -> Vec<Result<JobOutcome, EngineError>> {
        let executions = (self.plan)(date).into_iter().map(|params| async move {
            let result = orchestrator
                .execute(&self.source, &self.sink, params, max_retries)
                .await;
            if let Err(e) = &result {
                warn!(job_name = %self.name, %date, error = %e, kind = ?e.kind(), "execution not started");
            }
            result
        });
        join_all(executions).await
    }

    async fn resume(
        &self,
        orchestrator: &RetryOrchestrator,
        job_id: JobId,
    ) -> Result<JobOutcome, EngineError> {
        orchestrator.resume(&self.source, &self.sink, job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use tokio::time::Instant;

    use crate::domain::{DefaultDecider, FetchError, JobStatus, ReservationSummary};
    use crate::impls::{InMemoryLedger, InMemorySink};
    use crate::ports::{FixedClock, UlidGenerator};

    /// GC is down; the other sites answer. Keeps when each site was last asked.
    #[derive(Default)]
    struct GcDownSource {
        last_fetch: Mutex<HashMap<GolfSite, Instant>>,
    }

    #[async_trait]
    impl DataSource for GcDownSource {
        type Params = ReservationParams;
        type Record = ReservationSummary;

        async fn fetch(
            &self,
            params: &ReservationParams,
        ) -> Result<Vec<ReservationSummary>, FetchError> {
            self.last_fetch
                .lock()
                .unwrap()
                .insert(params.site, Instant::now());
            if params.site == GolfSite::Gc {
                return Err(FetchError::new("ORA-12541: TNS:no listener"));
            }
            Ok(vec![ReservationSummary {
                site: params.site,
                summary_date: params.job_date,
                data_name: "來場人數".into(),
                amount_day: 1,
                amount_month: 1,
                amount_year: 1,
            }])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn a_retrying_site_does_not_hold_back_the_others() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()));
        let orchestrator = RetryOrchestrator::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(DefaultDecider::default()),
            clock.clone(),
            Arc::new(UlidGenerator::new(clock)),
        );
        let job = Pipeline::golf_reservation(GcDownSource::default(), InMemorySink::new());
        let d = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let started = Instant::now();
        let results = job.run_for(&orchestrator, d, 3).await;

        let statuses: Vec<_> = results.iter().map(|r| r.as_ref().unwrap().status).collect();
        assert_eq!(
            statuses,
            vec![JobStatus::Failed, JobStatus::Finished, JobStatus::Finished]
        );

        let last_fetch = job.source.last_fetch.lock().unwrap().clone();
        assert!(last_fetch[&GolfSite::Th] - started < Duration::from_secs(1));
        assert!(last_fetch[&GolfSite::Os] - started < Duration::from_secs(1));
        assert!(last_fetch[&GolfSite::Gc] - started >= Duration::from_secs(7 * 60));
        assert_eq!(job.sink.rows().len(), 2);
    }

    #[test]
    fn golf_plan_covers_every_site() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let sites: Vec<_> = plan_reservation(d).into_iter().map(|p| p.site).collect();
        assert_eq!(sites, GolfSite::ALL.to_vec());
        assert_eq!(plan_invoice(d).len(), 1);
    }
}
