use rusqlite::Connection;

/// Initialise the ledger and fact-table schema in `conn`.
///
/// Idempotent (`IF NOT EXISTS` everywhere), so it runs on every start before
/// any trigger is registered.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS cron_jobs (
            job_id            INTEGER PRIMARY KEY AUTOINCREMENT,
            job_name          TEXT    NOT NULL,
            job_date          TEXT    NOT NULL,   -- YYYY-MM-DD
            job_params        TEXT    NOT NULL,   -- JSON-encoded JobParams
            job_params_hash   TEXT    NOT NULL,   -- hex SHA-256 of job_params
            job_status        TEXT    NOT NULL DEFAULT 'pending'
                CHECK (job_status IN ('pending', 'running', 'retrying', 'finished', 'failed')),
            message           TEXT,
            execution_time_ms INTEGER NOT NULL DEFAULT 0,
            retry_count       INTEGER NOT NULL DEFAULT 0,
            max_retries       INTEGER NOT NULL DEFAULT 3,
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL,
            finished_at       TEXT,
            UNIQUE (job_name, job_date, job_params_hash)
        ) STRICT;

        -- polling for work that is not finished yet
        CREATE INDEX IF NOT EXISTS idx_cron_jobs_status ON cron_jobs (job_status);
        CREATE INDEX IF NOT EXISTS idx_cron_jobs_job_name_date ON cron_jobs (job_name, job_date);

        CREATE TABLE IF NOT EXISTS funeral_invoices (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            invoice_date            TEXT    NOT NULL CHECK (length(invoice_date) = 10),
            c_idno2                 TEXT    NOT NULL CHECK (c_idno2 <> ''),
            total_amount_dividint10 INTEGER NOT NULL,
            created_at              TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (invoice_date, c_idno2)
        ) STRICT;

        CREATE TABLE IF NOT EXISTS reservation_summaries (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id      TEXT    NOT NULL,
            summary_date TEXT    NOT NULL,
            data_name    TEXT    NOT NULL CHECK (data_name <> ''),
            amt_d        INTEGER NOT NULL,
            amt_m        INTEGER NOT NULL,
            amt_y        INTEGER NOT NULL,
            created_at   TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (site_id, summary_date, data_name)
        ) STRICT;
        ",
    )
}
