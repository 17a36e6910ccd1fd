//! Lenient integer parsing for loosely-typed option values.
//!
//! Nothing here fails: unparseable input yields `None` and the caller picks
//! a default.

use serde_json::Value;

/// Parses a JSON integer, an integral float or a decimal string.
pub(crate) fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < i64::MAX as f64)
                .map(|float| float as i64)
        }),
        Value::String(text) => parse_integer_str(text),
        _ => None,
    }
}

pub(crate) fn parse_integer_str(text: &str) -> Option<i64> {
    text.trim().parse::<i64>().ok()
}

/// Parses an array whose every element is an integer.
///
/// A non-array value or any bad element rejects the whole array.
pub(crate) fn parse_integer_array(value: &Value) -> Option<Vec<i64>> {
    value.as_array()?.iter().map(parse_integer).collect()
}

pub(crate) fn parse_integer_list_str(text: &str) -> Option<Vec<i64>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    trimmed.split(',').map(parse_integer_str).collect()
}

pub(crate) fn positive_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|value| *value > 0)
}

pub(crate) fn positive_u64(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|value| *value > 0)
}

pub(crate) fn status_codes(values: Vec<i64>) -> Option<Vec<u16>> {
    values
        .into_iter()
        .map(|value| u16::try_from(value).ok())
        .collect()
}
