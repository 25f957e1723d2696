//! Domain model (IDs, params, records, ledger rows, outcomes, decisions).
//!
//! このモジュールは永続化や scheduler を前提にしません。
//! 形（型）と純粋な判断ロジックだけを置きます。

pub mod decision;
pub mod errors;
pub mod execution;
pub mod ids;
pub mod outcome;
pub mod params;
pub mod records;
pub mod retry;
pub mod state;

pub use self::decision::{Decider, Decision, DefaultDecider};
pub use self::errors::{EngineError, ErrorKind, FetchError, LedgerError, StoreError, error_chain};
pub use self::execution::{
    DEFAULT_MAX_RETRIES, JobExecution, NewJobExecution, StatusCounts, StatusUpdate,
};
pub use self::ids::{AttemptId, FireId, JobId};
pub use self::outcome::JobOutcome;
pub use self::params::{GolfSite, InvoiceParams, JobParams, ReservationParams};
pub use self::records::{FetchedRecord, FuneralInvoice, ReservationSummary};
pub use self::retry::RetryPolicy;
pub use self::state::JobStatus;
