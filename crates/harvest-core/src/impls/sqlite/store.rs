use std::marker::PhantomData;

use async_trait::async_trait;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::debug;

use super::{Database, run_blocking};
use crate::domain::params::format_date;
use crate::domain::{FetchedRecord, FuneralInvoice, ReservationSummary, StoreError};
use crate::ports::RecordSink;

/// Table mapping of a record type.
///
/// The sink builds `INSERT ... ON CONFLICT (<natural key>) DO NOTHING` from
/// these; only uniqueness conflicts are skipped, other constraint violations
/// still fail the batch.
pub trait SqlRecord: FetchedRecord {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    const CONFLICT_KEY: &'static [&'static str];

    /// Values in `COLUMNS` order.
    fn values(&self) -> Vec<Value>;
}

impl SqlRecord for FuneralInvoice {
    const TABLE: &'static str = "funeral_invoices";
    const COLUMNS: &'static [&'static str] =
        &["invoice_date", "c_idno2", "total_amount_dividint10"];
    const CONFLICT_KEY: &'static [&'static str] = &["invoice_date", "c_idno2"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(format_date(self.invoice_date)),
            Value::Text(self.customer_id.clone()),
            Value::Integer(self.total_amount),
        ]
    }
}

impl SqlRecord for ReservationSummary {
    const TABLE: &'static str = "reservation_summaries";
    const COLUMNS: &'static [&'static str] =
        &["site_id", "summary_date", "data_name", "amt_d", "amt_m", "amt_y"];
    const CONFLICT_KEY: &'static [&'static str] = &["site_id", "summary_date", "data_name"];

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.site.code().to_string()),
            Value::Text(format_date(self.summary_date)),
            Value::Text(self.data_name.clone()),
            Value::Integer(self.amount_day),
            Value::Integer(self.amount_month),
            Value::Integer(self.amount_year),
        ]
    }
}

fn insert_if_absent_sql<R: SqlRecord>() -> String {
    let placeholders = (1..=R::COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders,
        R::CONFLICT_KEY.join(", "),
    )
}

/// Idempotent store writer for one record type.
#[derive(Clone)]
pub struct SqliteRecordSink<R> {
    db: Database,
    insert_sql: String,
    _marker: PhantomData<fn() -> R>,
}

impl<R: SqlRecord> SqliteRecordSink<R> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            insert_sql: insert_if_absent_sql::<R>(),
            _marker: PhantomData,
        }
    }

    fn store_blocking(&self, records: &[R]) -> Result<usize, StoreError> {
        // Dropping `tx` without commit rolls the whole batch back.
        self.db
            .with_conn(|conn| {
                let tx = conn.transaction()?;
                let inserted = {
                    let mut stmt = tx.prepare(&self.insert_sql)?;
                    let mut inserted = 0;
                    for record in records {
                        inserted += stmt.execute(params_from_iter(record.values()))?;
                    }
                    inserted
                };
                tx.commit()?;
                Ok(inserted)
            })
            .map_err(|e| StoreError::Transaction(format!("{}: {e}", R::TABLE)))
    }
}

#[async_trait]
impl<R: SqlRecord> RecordSink<R> for SqliteRecordSink<R> {
    async fn store(&self, records: &[R]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let this = self.clone();
        let batch = records.to_vec();
        let inserted = run_blocking(move || this.store_blocking(&batch)).await?;
        debug!(table = R::TABLE, received = records.len(), inserted, "records stored");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GolfSite;
    use chrono::NaiveDate;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init_schema().unwrap();
        db
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        })
        .unwrap()
    }

    fn invoice(day: u32, customer: &str, amount: i64) -> FuneralInvoice {
        FuneralInvoice {
            invoice_date: NaiveDate::from_ymd_opt(2025, 4, day).unwrap(),
            customer_id: customer.to_string(),
            total_amount: amount,
        }
    }

    #[test]
    fn insert_statement_targets_the_natural_key() {
        assert_eq!(
            insert_if_absent_sql::<FuneralInvoice>(),
            "INSERT INTO funeral_invoices (invoice_date, c_idno2, total_amount_dividint10) \
             VALUES (?1, ?2, ?3) ON CONFLICT (invoice_date, c_idno2) DO NOTHING"
        );
    }

    #[tokio::test]
    async fn duplicate_natural_keys_are_skipped() {
        let db = db();
        let sink = SqliteRecordSink::<FuneralInvoice>::new(db.clone());

        let records = vec![invoice(1, "A1", 100), invoice(1, "A1", 999), invoice(1, "B2", 50)];
        assert_eq!(sink.store(&records).await.unwrap(), 2);
        assert_eq!(count(&db, "funeral_invoices"), 2);
    }

    #[tokio::test]
    async fn storing_the_same_batch_twice_is_idempotent() {
        let db = db();
        let sink = SqliteRecordSink::<FuneralInvoice>::new(db.clone());
        let records = vec![invoice(1, "A1", 100), invoice(2, "A1", 100), invoice(2, "C3", 7)];

        assert_eq!(sink.store(&records).await.unwrap(), 3);
        assert_eq!(sink.store(&records).await.unwrap(), 0);
        assert_eq!(count(&db, "funeral_invoices"), 3);
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        // no schema at all: an empty batch must not even touch the DB
        let sink = SqliteRecordSink::<FuneralInvoice>::new(Database::open_in_memory().unwrap());
        assert_eq!(sink.store(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn a_failing_row_rolls_back_the_whole_batch() {
        let db = db();
        let sink = SqliteRecordSink::<FuneralInvoice>::new(db.clone());

        // empty c_idno2 violates the CHECK constraint, which is not a conflict
        let records = vec![invoice(1, "A1", 100), invoice(1, "", 5), invoice(1, "B2", 50)];
        let err = sink.store(&records).await.unwrap_err();

        assert!(matches!(err, StoreError::Transaction(ref m) if m.contains("funeral_invoices")));
        assert_eq!(count(&db, "funeral_invoices"), 0);
    }

    #[tokio::test]
    async fn reservation_summaries_are_keyed_per_site() {
        let db = db();
        let sink = SqliteRecordSink::<ReservationSummary>::new(db.clone());
        let date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        let summary = |site| ReservationSummary {
            site,
            summary_date: date,
            data_name: "預約組數".to_string(),
            amount_day: 12,
            amount_month: 240,
            amount_year: 1800,
        };

        let records = vec![summary(GolfSite::Gc), summary(GolfSite::Th), summary(GolfSite::Gc)];
        assert_eq!(sink.store(&records).await.unwrap(), 2);
        assert_eq!(count(&db, "reservation_summaries"), 2);
    }
}
