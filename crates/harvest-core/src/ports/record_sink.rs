//! RecordSink port - 冪等な書き込み（Idempotent Store Writer）
//!
//! "insert if absent" の方言（SQLite の ON CONFLICT DO NOTHING など）は
//! 実装側に閉じ込めます。

use async_trait::async_trait;

use crate::domain::{FetchedRecord, StoreError};

/// Persists records under their natural-key uniqueness constraint.
///
/// # Contract
/// - empty input: `Ok(0)`, nothing touched
/// - rows whose natural key already exists are skipped, not errors
/// - all-or-nothing: on `Err` no row of the batch is visible
/// - returns the number of rows actually inserted
#[async_trait]
pub trait RecordSink<R: FetchedRecord>: Send + Sync {
    async fn store(&self, records: &[R]) -> Result<usize, StoreError>;
}
