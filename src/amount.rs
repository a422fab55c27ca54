// src/amount.rs
use serde_json::Value;

/// Decimals of the native coin (1 TON = 10^9 nanoton)
pub const TON_DECIMALS: u32 = 9;

/// Largest power of ten that fits in u128
const MAX_DECIMALS: u32 = 38;

/// Render `value` base units with `decimals` fractional digits, trailing zeros trimmed.
/// Integer arithmetic only. `None` when `decimals` is out of range.
pub fn format_units(value: u128, decimals: u32) -> Option<String> {
    if decimals == 0 {
        return Some(value.to_string());
    }
    if decimals > MAX_DECIMALS {
        return None;
    }
    let scale = 10u128.pow(decimals);
    let whole = value / scale;
    let frac = value % scale;
    if frac == 0 {
        return Some(whole.to_string());
    }
    let digits = format!("{:0width$}", frac, width = decimals as usize);
    Some(format!("{}.{}", whole, digits.trim_end_matches('0')))
}

pub fn format_nanoton(value: u128) -> String {
    // TON_DECIMALS is within range
    format_units(value, TON_DECIMALS).unwrap_or_else(|| value.to_string())
}

/// Strict non-negative integer: digits only, no sign, no exponent.
pub fn parse_units(s: &str) -> Option<u128> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Amounts arrive as JSON numbers or decimal strings depending on the endpoint.
pub fn units_from_json(v: &Value) -> Option<u128> {
    match v {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => parse_units(s),
        _ => None,
    }
}
