//! ManualTrigger - テスト用の trigger
//!
//! 登録された callback を保持し、`fire` / `fire_all` で即座に実行します。
//! 式の検証は CronTrigger と同じです。

use std::sync::Mutex;

use async_trait::async_trait;

use super::cron_trigger::parse_schedule;
use crate::ports::{TriggerCallback, TriggerError, TriggerMechanism};

#[derive(Default)]
pub struct ManualTrigger {
    callbacks: Mutex<Vec<TriggerCallback>>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the `index`-th callback to completion. Returns false if absent.
    pub async fn fire(&self, index: usize) -> bool {
        let callback = self.lock().get(index).cloned();
        match callback {
            Some(cb) => {
                cb().await;
                true
            }
            None => false,
        }
    }

    /// Runs every callback sequentially.
    pub async fn fire_all(&self) {
        let callbacks: Vec<TriggerCallback> = self.lock().clone();
        for cb in callbacks {
            cb().await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TriggerCallback>> {
        self.callbacks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TriggerMechanism for ManualTrigger {
    async fn register(&self, schedule: &str, callback: TriggerCallback) -> Result<(), TriggerError> {
        parse_schedule(schedule)?;
        self.lock().push(callback);
        Ok(())
    }

    async fn start(&self) -> Result<(), TriggerError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TriggerError> {
        Ok(())
    }
}
