//! IdGenerator port - ログ相関用 ID の生成
//!
//! ledger の job_id は DB が採番します。ここで作るのは
//! trigger fire と attempt に付ける ULID（tracing の span field 用）だけです。

use crate::domain::ids::{AttemptId, FireId};
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_fire_id(&self) -> FireId;

    fn generate_attempt_id(&self) -> AttemptId;
}

/// Clock の時刻 + 乱数で ULID を作る
///
/// FixedClock を使うと timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_fire_id(&self) -> FireId {
        FireId::from(self.next_ulid())
    }

    fn generate_attempt_id(&self) -> AttemptId {
        AttemptId::from(self.next_ulid())
    }
}
