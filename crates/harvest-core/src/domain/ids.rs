//! Domain identifiers (strongly-typed IDs).
//!
//! 2 種類の ID を使い分けます：
//! - **JobId**: ledger の surrogate key（SQLite の INTEGER PRIMARY KEY、単調増加）
//! - **FireId / AttemptId**: ログ相関用の ULID（永続化しない）
//!
//! ## Phantom Type パターン
//! `Id<T>` というジェネリック型で ULID 系 ID の共通実装を提供しつつ、
//! `T` はコンパイル時のマーカーとしてだけ使います（PhantomData）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Identifier of a ledger row (`cron_jobs.job_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for JobId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// IdMarker は ULID 系 ID のマーカー trait
///
/// Display で使うプレフィックス（"fire-", "attempt-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ULID ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Trigger fire のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fire {}

impl IdMarker for Fire {
    fn prefix() -> &'static str {
        "fire-"
    }
}

/// Attempt のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attempt {}

impl IdMarker for Attempt {
    fn prefix() -> &'static str {
        "attempt-"
    }
}

/// Identifier of one trigger fire (may fan out into several executions).
pub type FireId = Id<Fire>;

/// Identifier of one fetch+store try inside an execution.
pub type AttemptId = Id<Attempt>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_displays_with_prefix() {
        assert_eq!(JobId::new(42).to_string(), "job-42");
        assert_eq!(JobId::from(7).get(), 7);
    }

    #[test]
    fn job_id_serializes_as_plain_integer() {
        let s = serde_json::to_string(&JobId::new(3)).unwrap();
        assert_eq!(s, "3");
    }

    #[test]
    fn ulid_ids_are_distinct_types() {
        let ulid = Ulid::new();
        let fire = FireId::from_ulid(ulid);
        let attempt: AttemptId = ulid.into();

        assert_eq!(fire.as_ulid(), attempt.as_ulid());
        assert!(fire.to_string().starts_with("fire-"));
        assert!(attempt.to_string().starts_with("attempt-"));
        // let _: FireId = attempt; // <- does not compile
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<FireId>(), size_of::<Ulid>());
    }
}
