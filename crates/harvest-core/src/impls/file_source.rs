//! FileDropSource - エクスポートファイルからの取得
//!
//! ERP / golf 側のバッチが JSON を次の場所に置く前提です：
//!
//! ```text
//! <dir>/funeral_invoice/2025-06-01.json
//! <dir>/golf_reservation/2025-06-01-GC.json
//! ```
//!
//! ファイルがまだ無い・読めない・壊れている場合はすべて FetchError
//! （= retriable）。バッチが遅れて置かれれば次の attempt で拾えます。

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::params::{FUNERAL_INVOICE_JOB, GOLF_RESERVATION_JOB, format_date};
use crate::domain::{
    FetchError, FuneralInvoice, InvoiceParams, ReservationParams, ReservationSummary,
};
use crate::ports::DataSource;

/// Reads one export file per execution, typed by the record it yields.
#[derive(Debug, Clone)]
pub struct FileDropSource<R> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> R>,
}

impl<R> FileDropSource<R> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _marker: PhantomData,
        }
    }
}

impl FileDropSource<FuneralInvoice> {
    pub fn path_for(&self, params: &InvoiceParams) -> PathBuf {
        self.dir
            .join(FUNERAL_INVOICE_JOB)
            .join(format!("{}.json", format_date(params.job_date)))
    }
}

impl FileDropSource<ReservationSummary> {
    pub fn path_for(&self, params: &ReservationParams) -> PathBuf {
        self.dir.join(GOLF_RESERVATION_JOB).join(format!(
            "{}-{}.json",
            format_date(params.job_date),
            params.site
        ))
    }
}

async fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, FetchError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FetchError::with_source(format!("reading {}", path.display()), e))?;
    let rows: Vec<T> = serde_json::from_slice(&bytes)
        .map_err(|e| FetchError::with_source(format!("parsing {}", path.display()), e))?;
    debug!(path = %path.display(), rows = rows.len(), "export file read");
    Ok(rows)
}

#[async_trait]
impl DataSource for FileDropSource<FuneralInvoice> {
    type Params = InvoiceParams;
    type Record = FuneralInvoice;

    async fn fetch(&self, params: &InvoiceParams) -> Result<Vec<FuneralInvoice>, FetchError> {
        read_rows(&self.path_for(params)).await
    }
}

/// Row shape of the golf summary export; site and date come from the params.
#[derive(Debug, Deserialize)]
struct SummaryRow {
    data_name: String,
    amt_d: i64,
    amt_m: i64,
    amt_y: i64,
}

#[async_trait]
impl DataSource for FileDropSource<ReservationSummary> {
    type Params = ReservationParams;
    type Record = ReservationSummary;

    async fn fetch(
        &self,
        params: &ReservationParams,
    ) -> Result<Vec<ReservationSummary>, FetchError> {
        let rows: Vec<SummaryRow> = read_rows(&self.path_for(params)).await?;
        Ok(rows
            .into_iter()
            .map(|row| ReservationSummary {
                site: params.site,
                summary_date: params.job_date,
                data_name: row.data_name,
                amount_day: row.amt_d,
                amount_month: row.amt_m,
                amount_year: row.amt_y,
            })
            .collect())
    }
}
