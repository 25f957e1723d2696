//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - `build()` はまずスキーマを初期化する（失敗したら registrar を返さない）
//! - `expect_jobs()` で期待するジョブ名を宣言すると、未登録があれば BuildError
//! - trigger / clock / retry policy は差し替え可能（テストでは ManualTrigger + FixedClock）

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};

use super::{RetryOrchestrator, TriggerRegistrar};
use crate::domain::{
    DEFAULT_MAX_RETRIES, DefaultDecider, FuneralInvoice, ReservationSummary, RetryPolicy,
};
use crate::impls::{CronTrigger, Database, FileDropSource, SqliteLedger, SqliteRecordSink};
use crate::ports::{Clock, SystemClock, TriggerMechanism, UlidGenerator};
use crate::typed::{DynJob, JobRegistry, Pipeline, RegistryError};

/// Builds a [`TriggerRegistrar`] over one SQLite database.
///
/// # 使用例
/// ```ignore
/// let registrar = EngineBuilder::new(Database::open("harvest.db")?)
///     .with_file_sources("/srv/exports")?
///     .expect_jobs(&["golf_reservation"])
///     .build()?;
/// registrar.register("golf_reservation", "0 0 12 * * *", DateRule::Today).await?;
/// ```
pub struct EngineBuilder {
    database: Database,
    jobs: JobRegistry,
    trigger: Option<Arc<dyn TriggerMechanism>>,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    max_retries: u32,
    utc_offset: FixedOffset,
    expected_jobs: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("schema initialization failed: {0}")]
    Schema(#[from] rusqlite::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("missing jobs: {0:?}. These jobs were expected but not registered.")]
    MissingJobs(Vec<String>),
}

impl EngineBuilder {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            jobs: JobRegistry::new(),
            trigger: None,
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            utc_offset: Utc.fix(),
            expected_jobs: None,
        }
    }

    pub fn register<J: DynJob + 'static>(mut self, job: J) -> Result<Self, BuildError> {
        self.jobs.register(job)?;
        Ok(self)
    }

    /// Registers both built-in jobs, reading exports under `export_dir` and
    /// storing into this builder's database.
    pub fn with_file_sources(self, export_dir: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let export_dir = export_dir.into();
        let invoices = Pipeline::funeral_invoice(
            FileDropSource::<FuneralInvoice>::new(&export_dir),
            SqliteRecordSink::<FuneralInvoice>::new(self.database.clone()),
        );
        let reservations = Pipeline::golf_reservation(
            FileDropSource::<ReservationSummary>::new(&export_dir),
            SqliteRecordSink::<ReservationSummary>::new(self.database.clone()),
        );
        self.register(invoices)?.register(reservations)
    }

    /// Defaults to [`CronTrigger`].
    pub fn trigger(mut self, trigger: Arc<dyn TriggerMechanism>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Offset used to resolve "today" for date rules. Defaults to UTC.
    pub fn utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    pub fn expect_jobs(mut self, job_names: &[&str]) -> Self {
        self.expected_jobs = Some(job_names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<TriggerRegistrar, BuildError> {
        self.database.init_schema()?;

        if let Some(expected) = &self.expected_jobs {
            let registered = self.jobs.names();
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !registered.contains(*name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobs(missing));
            }
        }

        let ids = Arc::new(UlidGenerator::new(self.clock.clone()));
        let orchestrator = RetryOrchestrator::new(
            Arc::new(SqliteLedger::new(self.database)),
            Arc::new(DefaultDecider::new(self.retry_policy)),
            self.clock,
            ids,
        );
        let trigger = self
            .trigger
            .unwrap_or_else(|| Arc::new(CronTrigger::new()) as Arc<dyn TriggerMechanism>);

        Ok(TriggerRegistrar::new(
            Arc::new(orchestrator),
            self.jobs,
            trigger,
            self.max_retries,
            self.utc_offset,
        ))
    }
}
