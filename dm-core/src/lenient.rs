//! Forgiving integer decoding for tool arguments.
//!
//! Narrators send `3`, `3.0` and `"3"` interchangeably. All three decode to
//! the same integer; `3.5`, `"three"` and out-of-range values are errors.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read an integral JSON number or numeric string.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f <= i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn convert<E: serde::de::Error, T: TryFrom<i64>>(value: &Value) -> Result<T, E> {
    let n = as_integer(value).ok_or_else(|| E::custom(format!("expected an integer, got {value}")))?;
    T::try_from(n).map_err(|_| E::custom(format!("integer {n} is out of range")))
}

/// `deserialize_with` target for required integers.
pub fn int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Value::deserialize(deserializer)?;
    convert(&value)
}

/// `deserialize_with` target for optional integers; `null` reads as absent.
///
/// Pair with `#[serde(default)]` so a missing field is accepted too.
pub fn opt_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    convert(&value).map(Some)
}
