//! TriggerMechanism port - 周期実行の仕組み（cron）
//!
//! `(schedule expression, callback)` を登録するだけのインターフェース。
//! callback は引数なしで、登録時に必要なものを閉じ込めておきます。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Future returned by a trigger callback.
pub type TriggerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Callback invoked on each fire; may run on any runtime worker thread.
pub type TriggerCallback = Arc<dyn Fn() -> TriggerFuture + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("invalid schedule expression {expression:?}: {message}")]
    InvalidSchedule { expression: String, message: String },

    #[error("scheduler error: {0}")]
    Scheduler(String),
}

#[async_trait]
pub trait TriggerMechanism: Send + Sync {
    async fn register(&self, schedule: &str, callback: TriggerCallback) -> Result<(), TriggerError>;

    async fn start(&self) -> Result<(), TriggerError>;

    async fn shutdown(&self) -> Result<(), TriggerError>;
}
