//! Config - harvest.toml + HARVEST_ 環境変数
//!
//! 優先順位（後勝ち）: 組み込みデフォルト → harvest.toml → 環境変数
//!
//! 環境変数はセクションとキーを `__` で区切ります：
//! `HARVEST_DATABASE__PATH`, `HARVEST_ENGINE__MAX_RETRIES` など。

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use harvest_core::app::DateRule;
use harvest_core::domain::params::GOLF_RESERVATION_JOB;
use harvest_core::domain::{DEFAULT_MAX_RETRIES, RetryPolicy};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("utc_offset_hours out of range: {0}")]
    InvalidOffset(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub sources: SourcesConfig,
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    /// 6-field cron expression (with seconds).
    pub schedule: String,
    #[serde(default)]
    pub date_rule: DateRule,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: PathBuf::from("harvest.db"),
            },
            engine: EngineConfig {
                max_retries: DEFAULT_MAX_RETRIES,
                backoff_base_secs: 60,
                utc_offset_hours: 0,
            },
            sources: SourcesConfig {
                export_dir: PathBuf::from("exports"),
            },
            // golf summary at noon, every day
            jobs: vec![JobConfig {
                name: GOLF_RESERVATION_JOB.to_string(),
                schedule: "0 0 12 * * *".to_string(),
                date_rule: DateRule::Today,
                enabled: true,
            }],
        }
    }
}

impl HarvestConfig {
    /// Loads defaults, then `path` if it exists, then `HARVEST_*` env vars.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Figment::from(Serialized::defaults(HarvestConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HARVEST_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        let hours = self.engine.utc_offset_hours;
        hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::InvalidOffset(hours))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(self.engine.backoff_base_secs), 2.0)
    }

    pub fn enabled_jobs(&self) -> impl Iterator<Item = &JobConfig> {
        self.jobs.iter().filter(|job| job.enabled)
    }
}
