//! SQLite 実装（rusqlite, bundled）
//!
//! 1 本の `Connection` を `Arc<Mutex<_>>` で共有します。
//! ロックは同期区間だけで取り、`.await` をまたいで保持しません。
//! async 側からの呼び出しは `run_blocking` で blocking pool に逃がし、
//! busy_timeout の待ちが runtime の worker を止めないようにします。

mod ledger;
mod schema;
mod store;

pub use self::ledger::SqliteLedger;
pub use self::schema::init_schema;
pub use self::store::{SqlRecord, SqliteRecordSink};

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use tokio::task::JoinError;

use crate::domain::{LedgerError, StoreError};

/// Shared handle to the destination database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Create tables and indexes if absent.
    pub fn init_schema(&self) -> rusqlite::Result<()> {
        self.with_conn(|conn| init_schema(conn))
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// A poisoned lock is recovered: the connection itself holds no Rust-side
    /// invariants a panic could have broken.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> rusqlite::Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut conn)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<JoinError> for LedgerError {
    fn from(e: JoinError) -> Self {
        LedgerError::Storage(format!("ledger task did not complete: {e}"))
    }
}

impl From<JoinError> for StoreError {
    fn from(e: JoinError) -> Self {
        StoreError::Transaction(format!("store task did not complete: {e}"))
    }
}

/// Runs a synchronous database call on tokio's blocking pool.
pub(crate) async fn run_blocking<T, E>(
    f: impl FnOnce() -> Result<T, E> + Send + 'static,
) -> Result<T, E>
where
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Decode(format!("timestamp {s:?}: {e}")))
}
