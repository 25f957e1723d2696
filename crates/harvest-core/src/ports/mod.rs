//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。
//! エンジン本体（app）はこれらの trait だけに依存し、
//! SQLite / cron / ファイル取り込みの詳細は impls に置きます。

pub mod clock;
pub mod data_source;
pub mod id_generator;
pub mod ledger;
pub mod record_sink;
pub mod trigger;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::data_source::DataSource;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::ledger::Ledger;
pub use self::record_sink::RecordSink;
pub use self::trigger::{TriggerCallback, TriggerError, TriggerFuture, TriggerMechanism};
