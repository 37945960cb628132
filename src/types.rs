use serde::{Deserialize, Serialize};

use crate::config::CELL_COUNT;
use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Raw extraction output
// ---------------------------------------------------------------------------

/// One scraped table row: the first `CELL_COUNT` cell texts in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<String>,
}

impl RawRow {
    /// Builds a row from the cells read off the page. Cells beyond
    /// `CELL_COUNT` are ignored; fewer is a shortfall.
    pub fn from_cells(mut cells: Vec<String>) -> Result<Self> {
        if cells.len() < CELL_COUNT {
            return Err(AppError::ExtractionShortfall(format!(
                "row has {} cells, expected at least {CELL_COUNT}",
                cells.len()
            )));
        }
        cells.truncate(CELL_COUNT);
        Ok(Self { cells })
    }

    #[cfg(test)]
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<String> {
        self.cells
    }
}

// ---------------------------------------------------------------------------
// Columns and cell values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Name,
    Symbol,
    LastPrice,
    NameSymbol,
    CurrentPrice,
    Change24h,
    Change7d,
    MarketCap,
    Volume24h,
    VolumeChange,
    Extra,
    PercentageChange,
    ZscorePrice,
    RollingAvg,
    DatetimeIst,
}

impl Column {
    /// Name used for this column in the warehouse table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Name => "Name",
            Column::Symbol => "Symbol",
            Column::LastPrice => "Last_Price",
            Column::NameSymbol => "name_symbol",
            Column::CurrentPrice => "current_price",
            Column::Change24h => "Change_24_hours",
            Column::Change7d => "Change_7_days",
            Column::MarketCap => "market_cap",
            Column::Volume24h => "volume_24_hour",
            Column::VolumeChange => "volume_change",
            Column::Extra => "Extra",
            Column::PercentageChange => "percentage_change",
            Column::ZscorePrice => "zscore_price",
            Column::RollingAvg => "rolling_avg",
            Column::DatetimeIst => "datetime_ist",
        }
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column layout of a scraped row, in table display order.
pub const RAW_COLUMNS: [Column; CELL_COUNT] = [
    Column::Name,
    Column::Symbol,
    Column::LastPrice,
    Column::NameSymbol,
    Column::CurrentPrice,
    Column::Change24h,
    Column::Change7d,
    Column::MarketCap,
    Column::Volume24h,
    Column::VolumeChange,
    Column::Extra,
];

/// Columns dropped right after extraction. `current_price` is the canonical
/// price; `Last_Price` and `Extra` are never loaded.
pub const DROPPED_COLUMNS: [Column; 2] = [Column::Extra, Column::LastPrice];

/// Final column selection, in warehouse order.
pub const OUTPUT_COLUMNS: [Column; 11] = [
    Column::NameSymbol,
    Column::CurrentPrice,
    Column::Change24h,
    Column::Change7d,
    Column::MarketCap,
    Column::Volume24h,
    Column::VolumeChange,
    Column::PercentageChange,
    Column::ZscorePrice,
    Column::RollingAvg,
    Column::DatetimeIst,
];

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Null,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Option<f64>> for Value {
    fn from(n: Option<f64>) -> Self {
        n.map(Value::Number).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Output record
// ---------------------------------------------------------------------------

/// One transformed listing, shaped like a row of the warehouse table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRow {
    pub name_symbol: String,
    pub current_price: f64,
    #[serde(rename = "Change_24_hours")]
    pub change_24h: String,
    #[serde(rename = "Change_7_days")]
    pub change_7d: String,
    pub market_cap: f64,
    #[serde(rename = "volume_24_hour")]
    pub volume_24h: f64,
    pub volume_change: String,
    /// `None` for the first row of a batch.
    pub percentage_change: Option<f64>,
    /// `None` when the batch prices have no dispersion.
    pub zscore_price: Option<f64>,
    /// `None` for the first two rows of a batch.
    pub rolling_avg: Option<f64>,
    pub datetime_ist: String,
}

// ---------------------------------------------------------------------------
// Warehouse table identifier
// ---------------------------------------------------------------------------

/// Fully-qualified `project.dataset.table` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl std::str::FromStr for TableId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        let [project, dataset, table] = parts.as_slice() else {
            return Err(AppError::Config(format!(
                "table id {s:?} must have the form project.dataset.table"
            )));
        };
        for segment in [project, dataset, table] {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(AppError::Config(format!(
                    "table id {s:?} has an invalid segment {segment:?}"
                )));
            }
        }
        Ok(Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        })
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}
