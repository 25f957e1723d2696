//! harvest-core
//!
//! Job execution engine: scheduled pulls of business records from remote
//! systems into a local SQLite store, with a durable execution ledger.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, params, records, execution, state, retry, decision, outcome, errors）
//! - **ports**: 抽象化レイヤー（DataSource, RecordSink, Ledger, TriggerMechanism, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（orchestrator, registrar, builder, status）
//! - **typed**: 型付きジョブ API（Pipeline, DynJob, JobRegistry）
//! - **impls**: 実装（SQLite, in-memory, file drop, cron）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
