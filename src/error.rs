use thiserror::Error;

use crate::types::Column;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("Extraction shortfall: {0}")]
    ExtractionShortfall(String),

    #[error("Cannot convert {value:?} to a number")]
    NumberParse {
        value: String,
        #[source]
        source: std::num::ParseFloatError,
    },

    #[error("Column {0} holds non-numeric values")]
    NotNumeric(Column),

    #[error("Missing column: {0}")]
    MissingColumn(Column),

    #[error("Warehouse error: {0}")]
    Warehouse(String),

    #[error("Credentials error: {0}")]
    Auth(#[from] gcp_auth::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
