//! Job parameters: one variant per job type.
//!
//! At rest the ledger stores `job_params` as JSON text plus a SHA-256 hash of
//! that text (part of the uniqueness key). In code each data source receives
//! its own typed params struct, so a golf adapter cannot be handed invoice
//! parameters.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Layout used for `job_date` and for dates inside params.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const FUNERAL_INVOICE_JOB: &str = "funeral_invoice";
pub const GOLF_RESERVATION_JOB: &str = "golf_reservation";

/// Serialized parameter bag of a ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobParams {
    FuneralInvoice(InvoiceParams),
    GolfReservation(ReservationParams),
}

impl JobParams {
    /// Logical job name (`cron_jobs.job_name`).
    pub fn job_name(&self) -> &'static str {
        match self {
            JobParams::FuneralInvoice(_) => FUNERAL_INVOICE_JOB,
            JobParams::GolfReservation(_) => GOLF_RESERVATION_JOB,
        }
    }

    /// Business date the execution targets.
    pub fn job_date(&self) -> NaiveDate {
        match self {
            JobParams::FuneralInvoice(p) => p.job_date,
            JobParams::GolfReservation(p) => p.job_date,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Hex-encoded SHA-256 of the serialized params.
pub fn params_hash(params_json: &str) -> String {
    hex::encode(Sha256::digest(params_json.as_bytes()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
}

/// Parameters of the funeral-service invoice pull (ERP).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceParams {
    pub job_date: NaiveDate,
}

impl From<InvoiceParams> for JobParams {
    fn from(p: InvoiceParams) -> Self {
        JobParams::FuneralInvoice(p)
    }
}

/// Hands the params back unchanged when they belong to another job.
impl TryFrom<JobParams> for InvoiceParams {
    type Error = JobParams;

    fn try_from(params: JobParams) -> Result<Self, Self::Error> {
        match params {
            JobParams::FuneralInvoice(p) => Ok(p),
            other => Err(other),
        }
    }
}

/// Parameters of the golf reservation summary pull (one site per execution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationParams {
    pub site: GolfSite,
    pub job_date: NaiveDate,
}

impl From<ReservationParams> for JobParams {
    fn from(p: ReservationParams) -> Self {
        JobParams::GolfReservation(p)
    }
}

impl TryFrom<JobParams> for ReservationParams {
    type Error = JobParams;

    fn try_from(params: JobParams) -> Result<Self, Self::Error> {
        match params {
            JobParams::GolfReservation(p) => Ok(p),
            other => Err(other),
        }
    }
}

/// Golf course databases the reservation summary is pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GolfSite {
    #[serde(rename = "GC")]
    Gc,
    #[serde(rename = "TH")]
    Th,
    #[serde(rename = "OS")]
    Os,
}

impl GolfSite {
    pub const ALL: [GolfSite; 3] = [GolfSite::Gc, GolfSite::Th, GolfSite::Os];

    pub fn code(self) -> &'static str {
        match self {
            GolfSite::Gc => "GC",
            GolfSite::Th => "TH",
            GolfSite::Os => "OS",
        }
    }
}

impl fmt::Display for GolfSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for GolfSite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GC" => Ok(GolfSite::Gc),
            "TH" => Ok(GolfSite::Th),
            "OS" => Ok(GolfSite::Os),
            other => Err(format!("unknown golf site: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn params_serialize_with_kind_tag() {
        let params: JobParams = ReservationParams {
            site: GolfSite::Th,
            job_date: date(2025, 3, 1),
        }
        .into();

        let v: serde_json::Value = serde_json::from_str(&params.to_json().unwrap()).unwrap();
        assert_eq!(v["kind"], "golf_reservation");
        assert_eq!(v["site"], "TH");
        assert_eq!(v["job_date"], "2025-03-01");
    }

    #[test]
    fn job_name_and_date_follow_the_variant() {
        let params: JobParams = InvoiceParams {
            job_date: date(2025, 1, 31),
        }
        .into();
        assert_eq!(params.job_name(), FUNERAL_INVOICE_JOB);
        assert_eq!(format_date(params.job_date()), "2025-01-31");

        let back = JobParams::from_json(&params.to_json().unwrap()).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn hash_differs_per_site_for_the_same_date() {
        let a: JobParams = ReservationParams { site: GolfSite::Gc, job_date: date(2025, 3, 1) }.into();
        let b: JobParams = ReservationParams { site: GolfSite::Os, job_date: date(2025, 3, 1) }.into();

        let ha = params_hash(&a.to_json().unwrap());
        let hb = params_hash(&b.to_json().unwrap());
        assert_ne!(ha, hb);
        assert_eq!(ha.len(), 64);
        assert_eq!(ha, params_hash(&a.to_json().unwrap()));
    }

    #[test]
    fn typed_params_come_back_out_of_the_tag() {
        let stored: JobParams = ReservationParams { site: GolfSite::Os, job_date: date(2025, 3, 1) }.into();

        let typed = ReservationParams::try_from(stored.clone()).unwrap();
        assert_eq!(typed.site, GolfSite::Os);

        let rejected = InvoiceParams::try_from(stored.clone()).unwrap_err();
        assert_eq!(rejected, stored);
    }

    #[test]
    fn golf_site_parses_case_insensitively() {
        assert_eq!("th".parse::<GolfSite>(), Ok(GolfSite::Th));
        assert!("XX".parse::<GolfSite>().is_err());
    }
}
