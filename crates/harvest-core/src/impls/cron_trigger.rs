//! CronTrigger - cron 式による周期実行
//!
//! 式は `cron` crate の 6 フィールド形式（秒 分 時 日 月 曜日）です。
//! 例: `0 0 12 * * *` = 毎日 12:00:00 (UTC)
//!
//! entry ごとに timer task を 1 本立て、fire のたびに callback を
//! 別 task として spawn します。shutdown は timer task を止めるだけで、
//! 実行中の callback は最後まで走らせます。

use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::ports::{TriggerCallback, TriggerError, TriggerMechanism};

/// Parses a schedule expression, mapping errors to [`TriggerError`].
pub fn parse_schedule(expression: &str) -> Result<Schedule, TriggerError> {
    Schedule::from_str(expression).map_err(|e| TriggerError::InvalidSchedule {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

#[derive(Default)]
struct CronState {
    pending: Vec<(String, Schedule, TriggerCallback)>,
    timers: Vec<JoinHandle<()>>,
    started: bool,
    stopped: bool,
}

/// Wall-clock cron trigger.
#[derive(Default)]
pub struct CronTrigger {
    state: Mutex<CronState>,
}

impl CronTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CronState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn spawn_timer(expression: String, schedule: Schedule, callback: TriggerCallback) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(next) = schedule.upcoming(Utc).next() {
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            debug!(schedule = %expression, next = %next, "waiting for next fire");
            tokio::time::sleep(wait).await;
            tokio::spawn(callback());
        }
        info!(schedule = %expression, "schedule has no upcoming fire time");
    })
}

#[async_trait]
impl TriggerMechanism for CronTrigger {
    async fn register(&self, schedule: &str, callback: TriggerCallback) -> Result<(), TriggerError> {
        let parsed = parse_schedule(schedule)?;
        let mut state = self.lock();
        if state.stopped {
            return Err(TriggerError::Scheduler("trigger already shut down".into()));
        }
        if state.started {
            state
                .timers
                .push(spawn_timer(schedule.to_string(), parsed, callback));
        } else {
            state.pending.push((schedule.to_string(), parsed, callback));
        }
        Ok(())
    }

    async fn start(&self) -> Result<(), TriggerError> {
        let mut state = self.lock();
        if state.stopped {
            return Err(TriggerError::Scheduler("trigger already shut down".into()));
        }
        if state.started {
            return Ok(());
        }
        state.started = true;
        let pending = std::mem::take(&mut state.pending);
        for (expression, schedule, callback) in pending {
            state.timers.push(spawn_timer(expression, schedule, callback));
        }
        info!(entries = state.timers.len(), "cron trigger started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TriggerError> {
        let mut state = self.lock();
        state.stopped = true;
        for timer in state.timers.drain(..) {
            timer.abort();
        }
        info!("cron trigger stopped");
        Ok(())
    }
}
