//! Typed - 型付きジョブ API
//!
//! DataSource の `Params` / `Record` と RecordSink の組み合わせを
//! コンパイル時に保証し、registrar には object-safe な `DynJob` だけを渡します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Pipeline<S, W>` - 型安全
//! - **内部（Dyn）**: `DynJob` trait - object-safe, type erasure

pub mod job;
pub mod registry;

pub use self::job::{DynJob, Pipeline, Planner, plan_invoice, plan_reservation};
pub use self::registry::{JobRegistry, RegistryError};
