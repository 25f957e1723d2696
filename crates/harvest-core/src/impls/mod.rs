//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **sqlite**: SqliteLedger / SqliteRecordSink（本番用、rusqlite bundled）
//! - **memory**: InMemoryLedger / InMemorySink（テスト・dry run 用）
//! - **file_source**: FileDropSource（エクスポート JSON からの取得）
//! - **cron_trigger**: CronTrigger（cron 式 + tokio timer）
//! - **manual_trigger**: ManualTrigger（テスト用）

pub mod cron_trigger;
pub mod file_source;
pub mod manual_trigger;
pub mod memory;
pub mod sqlite;

pub use self::cron_trigger::{CronTrigger, parse_schedule};
pub use self::file_source::FileDropSource;
pub use self::manual_trigger::ManualTrigger;
pub use self::memory::{InMemoryLedger, InMemorySink};
pub use self::sqlite::{Database, SqlRecord, SqliteLedger, SqliteRecordSink, init_schema};
