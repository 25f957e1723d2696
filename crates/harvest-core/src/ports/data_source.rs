//! DataSource port - リモート（ERP / golf DB）からの取得
//!
//! stored procedure の呼び出しや行の fetch はこの trait の向こう側です。
//! エンジンから見ると「params を渡すとレコード列かエラーが返る」だけ。

use async_trait::async_trait;

use crate::domain::{FetchError, FetchedRecord, JobParams};

/// Remote fetch for one job type.
///
/// # 設計原則
/// - `Params` は job type ごとの型付き struct（呼び出し側で取り違えない）
/// - `Into<JobParams>` で ledger 用のタグ付き enum に変換し、
///   `TryFrom<JobParams>` で ledger 行から取り戻す（resume 用）
/// - エラーはすべて retriable として扱われる
#[async_trait]
pub trait DataSource: Send + Sync {
    type Params: Clone
        + Into<JobParams>
        + TryFrom<JobParams, Error = JobParams>
        + Send
        + Sync
        + 'static;
    type Record: FetchedRecord;

    async fn fetch(&self, params: &Self::Params) -> Result<Vec<Self::Record>, FetchError>;
}
