//! Fetched business records.
//!
//! Records are flat value objects. Each one exposes a natural key; the
//! destination store holds at most one row per key.

use std::hash::Hash;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::params::GolfSite;

/// A fetched record with a business-meaning uniqueness key.
pub trait FetchedRecord: Clone + Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;

    fn natural_key(&self) -> Self::Key;
}

/// One row of the ERP funeral-service invoice view.
///
/// `total_amount` is tax-inclusive and already divided by 10 at the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuneralInvoice {
    pub invoice_date: NaiveDate,
    #[serde(rename = "c_idno2")]
    pub customer_id: String,
    #[serde(rename = "total_amount_dividint10")]
    pub total_amount: i64,
}

impl FetchedRecord for FuneralInvoice {
    type Key = (NaiveDate, String);

    fn natural_key(&self) -> Self::Key {
        (self.invoice_date, self.customer_id.clone())
    }
}

/// Day / month-to-date / year-to-date reservation counts of one golf site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSummary {
    pub site: GolfSite,
    pub summary_date: NaiveDate,
    pub data_name: String,
    pub amount_day: i64,
    pub amount_month: i64,
    pub amount_year: i64,
}

impl FetchedRecord for ReservationSummary {
    type Key = (GolfSite, NaiveDate, String);

    fn natural_key(&self) -> Self::Key {
        (self.site, self.summary_date, self.data_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_key_ignores_amount() {
        let d = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        let a = FuneralInvoice { invoice_date: d, customer_id: "A123".into(), total_amount: 100 };
        let b = FuneralInvoice { total_amount: 250, ..a.clone() };
        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn invoice_uses_erp_column_names_in_json() {
        let json = r#"{"invoice_date":"2025-05-02","c_idno2":"A123","total_amount_dividint10":42}"#;
        let inv: FuneralInvoice = serde_json::from_str(json).unwrap();
        assert_eq!(inv.customer_id, "A123");
        assert_eq!(inv.total_amount, 42);
    }
}
