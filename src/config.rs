use std::time::Duration;

use crate::error::{AppError, Result};
use crate::types::TableId;

pub const SOURCE_URL: &str = "https://www.investing.com/crypto/currencies";
pub const TABLE_ID: &str = "naushad1609.scraping.crypto_currency";
pub const BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com";

/// Number of listings taken from the top of the table.
pub const ROW_COUNT: usize = 10;

/// Cells read per row; the table has more, the rest are ignored.
pub const CELL_COUNT: usize = 11;

pub const CONSENT_SELECTOR: &str = "#onetrust-accept-btn-handler";
pub const ROW_SELECTOR: &str = "table tbody tr";
pub const CELL_SELECTOR: &str = "td";

/// Vertical scroll offset that brings the listings table into view.
pub const SCROLL_Y: u32 = 1000;

pub const CONSENT_PAUSE_SECS: u64 = 2;
pub const SCROLL_PAUSE_SECS: u64 = 3;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

pub const WINDOW_SIZE: (u32, u32) = (1920, 1080);

/// Asia/Kolkata has no DST, so a fixed offset is exact.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseKind {
    BigQuery,
    Sqlite,
}

impl std::str::FromStr for WarehouseKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bigquery" => Ok(WarehouseKind::BigQuery),
            "sqlite" => Ok(WarehouseKind::Sqlite),
            other => Err(AppError::Config(format!(
                "WAREHOUSE must be bigquery or sqlite, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub source_url: String,
    pub table_id: TableId,
    pub warehouse: WarehouseKind,
    /// Database file for the sqlite warehouse (SQLITE_PATH)
    pub sqlite_path: String,
    pub bigquery_api_url: String,
    /// Bearer token override (BIGQUERY_ACCESS_TOKEN, falls back to GOOGLE_OAUTH_ACCESS_TOKEN);
    /// application default credentials are used when unset
    pub bigquery_access_token: Option<String>,
    /// Dataset location passed when polling load jobs (BIGQUERY_LOCATION)
    pub bigquery_location: Option<String>,
    /// Explicit Chrome/Chromium binary; autodetected when unset (CHROME_EXECUTABLE)
    pub chrome_executable: Option<String>,
    /// Bound on every page element wait (WAIT_TIMEOUT_SECS)
    pub wait_timeout: Duration,
    /// Bound on the warehouse acknowledgement (LOAD_TIMEOUT_SECS)
    pub load_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let warehouse: WarehouseKind = var("WAREHOUSE")
            .unwrap_or_else(|| "bigquery".to_string())
            .parse()?;

        let bigquery_access_token = var("BIGQUERY_ACCESS_TOKEN")
            .or_else(|| var("GOOGLE_OAUTH_ACCESS_TOKEN"))
            .filter(|t| !t.trim().is_empty());

        Ok(Self {
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            source_url: var("SOURCE_URL").unwrap_or_else(|| SOURCE_URL.to_string()),
            table_id: var("TABLE_ID")
                .unwrap_or_else(|| TABLE_ID.to_string())
                .parse()?,
            warehouse,
            sqlite_path: var("SQLITE_PATH").unwrap_or_else(|| "crypto.db".to_string()),
            bigquery_api_url: var("BIGQUERY_API_URL")
                .unwrap_or_else(|| BIGQUERY_API_URL.to_string()),
            bigquery_access_token,
            bigquery_location: var("BIGQUERY_LOCATION").filter(|s| !s.trim().is_empty()),
            chrome_executable: var("CHROME_EXECUTABLE").filter(|s| !s.trim().is_empty()),
            wait_timeout: Duration::from_secs(parse_secs(&var, "WAIT_TIMEOUT_SECS", 20)?),
            load_timeout: Duration::from_secs(parse_secs(&var, "LOAD_TIMEOUT_SECS", 120)?),
        })
    }
}

fn parse_secs(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match var(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("{key} must be a whole number of seconds"))),
    }
}
