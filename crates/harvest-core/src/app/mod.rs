//! App - アプリケーション層
//!
//! ports を組み合わせてジョブ実行エンジンを組み立てます。
//!
//! # 主要コンポーネント
//! - **RetryOrchestrator**: 1 execution を create → fetch → store → terminal まで運ぶ
//! - **TriggerRegistrar**: ジョブ名と schedule を結び付け、fire ごとに orchestrator を呼ぶ
//! - **EngineBuilder**: スキーマ初期化とワイヤリング
//! - **LedgerStatus**: ledger の照会ビュー

pub mod builder;
pub mod orchestrator;
pub mod registrar;
pub mod status;

pub use self::builder::{BuildError, EngineBuilder};
pub use self::orchestrator::RetryOrchestrator;
pub use self::registrar::{DateRule, TriggerEntry, TriggerRegistrar};
pub use self::status::LedgerStatus;
