use crate::error::{AppError, Result};
use crate::types::Value;

/// Convert display-formatted figures like `$1.2K`, `2.5M` or `1,234.50` to a
/// number. Non-text values are returned unchanged.
///
/// Suffixes are case-sensitive and limited to K/M/B/T. Anything that is
/// neither a suffixed nor a plain decimal fails; there is no default.
pub fn parse_abbreviated(value: &Value) -> Result<Value> {
    let Value::Text(raw) = value else {
        return Ok(value.clone());
    };
    let s = strip_currency(raw);

    let multiplier = match s.chars().last() {
        Some('K') => 1e3,
        Some('M') => 1e6,
        Some('B') => 1e9,
        Some('T') => 1e12,
        _ => return to_f64(raw, &s).map(Value::Number),
    };
    let digits = &s[..s.len() - 1];
    Ok(Value::Number(to_f64(raw, digits)? * multiplier))
}

/// Currency parse for the price column: `$` and `,` removed, no suffixes.
pub fn parse_price(value: &Value) -> Result<Value> {
    let Value::Text(raw) = value else {
        return Ok(value.clone());
    };
    to_f64(raw, &strip_currency(raw)).map(Value::Number)
}

fn strip_currency(raw: &str) -> String {
    raw.replace(['$', ','], "").trim().to_string()
}

fn to_f64(raw: &str, digits: &str) -> Result<f64> {
    digits.trim().parse::<f64>().map_err(|source| AppError::NumberParse {
        value: raw.to_string(),
        source,
    })
}
