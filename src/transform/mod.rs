pub mod frame;
pub mod parse;
pub mod stats;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::debug;

use crate::config::{DATETIME_FORMAT, IST_OFFSET_SECS};
use crate::error::{AppError, Result};
use crate::types::{Column, RawRow, TypedRow, Value, DROPPED_COLUMNS, OUTPUT_COLUMNS};

pub use frame::Frame;
pub use parse::{parse_abbreviated, parse_price};

/// Current wall-clock time in India Standard Time.
pub fn ist_now() -> DateTime<FixedOffset> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&ist)
}

/// Turns a scraped batch into typed rows.
///
/// Two phases: every row's numeric columns are parsed first, then the
/// batch-wide statistics are derived from the parsed prices. The batch is
/// then narrowed to `OUTPUT_COLUMNS`. Any failure aborts the whole batch.
pub fn transform(raw: Vec<RawRow>, captured_at: DateTime<FixedOffset>) -> Result<Vec<TypedRow>> {
    let mut frame = Frame::from_raw(raw);
    frame.drop_columns(&DROPPED_COLUMNS);

    frame.try_map_column(Column::CurrentPrice, parse_price)?;
    frame.try_map_column(Column::Volume24h, parse_abbreviated)?;
    frame.try_map_column(Column::MarketCap, parse_abbreviated)?;

    derive_statistics(&mut frame, captured_at)?;

    let narrowed = frame.select(&OUTPUT_COLUMNS)?;
    debug!(rows = narrowed.len(), "transformed batch");
    typed_rows(&narrowed)
}

/// Adds `percentage_change`, `zscore_price`, `rolling_avg` and `datetime_ist`.
pub fn derive_statistics(frame: &mut Frame, captured_at: DateTime<FixedOffset>) -> Result<()> {
    let prices = frame.numbers(Column::CurrentPrice)?;

    let to_values =
        |col: Vec<Option<f64>>| -> Vec<Value> { col.into_iter().map(Value::from).collect() };
    frame.set_column(Column::PercentageChange, to_values(stats::percentage_change(&prices)));
    frame.set_column(Column::ZscorePrice, to_values(stats::zscore(&prices)));
    frame.set_column(Column::RollingAvg, to_values(stats::rolling_mean(&prices)));

    let stamp = captured_at.format(DATETIME_FORMAT).to_string();
    frame.set_column(Column::DatetimeIst, vec![Value::Text(stamp); prices.len()]);
    Ok(())
}

fn typed_rows(frame: &Frame) -> Result<Vec<TypedRow>> {
    (0..frame.len())
        .map(|i| {
            let text = |c: Column| -> Result<String> {
                match frame.value(i, c)? {
                    Value::Text(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Null => Ok(String::new()),
                }
            };
            let number = |c: Column| -> Result<f64> {
                frame.value(i, c)?.as_f64().ok_or(AppError::NotNumeric(c))
            };
            let optional = |c: Column| -> Result<Option<f64>> {
                match frame.value(i, c)? {
                    Value::Number(n) => Ok(Some(*n)),
                    Value::Null => Ok(None),
                    Value::Text(_) => Err(AppError::NotNumeric(c)),
                }
            };

            Ok(TypedRow {
                name_symbol: text(Column::NameSymbol)?,
                current_price: number(Column::CurrentPrice)?,
                change_24h: text(Column::Change24h)?,
                change_7d: text(Column::Change7d)?,
                market_cap: number(Column::MarketCap)?,
                volume_24h: number(Column::Volume24h)?,
                volume_change: text(Column::VolumeChange)?,
                percentage_change: optional(Column::PercentageChange)?,
                zscore_price: optional(Column::ZscorePrice)?,
                rolling_avg: optional(Column::RollingAvg)?,
                datetime_ist: text(Column::DatetimeIst)?,
            })
        })
        .collect()
}
