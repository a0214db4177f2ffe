//! Payload normalization
//!
//! Telemetry producers disagree on key names and units. Hardware publishes a
//! raw distance under `distance` or `filledLevel`; admin tooling publishes a
//! percentage under `filled_level`. This module resolves all of them into a
//! single [`ReadingDelta`] using a fixed precedence table.
//!
//! # Precedence
//!
//! | field       | keys, first match wins                                             |
//! |-------------|--------------------------------------------------------------------|
//! | id          | `id`, `binId`                                                      |
//! | fill        | `filled_level`, `filled_level_percent`, `filledLevel` (if 0..=100), |
//! |             | `distance`, `distance_cm`, `filledLevel`                            |
//! | other       | `temperature`, `latitude`, `longitude`, `height` (exact)           |

use serde_json::{Map, Value};

use crate::error::IngestError;

use super::reading::{FillInput, ReadingDelta};

/// Identifier keys in precedence order
pub const ID_KEYS: &[&str] = &["id", "binId"];

/// How a fill key is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillShape {
    /// Percentage
    Percent,
    /// Raw distance in centimeters
    Distance,
    /// Range rule, but only matches when the value lies in `[0, 100]`
    AutoInRange,
    /// Range rule
    Auto,
}

/// Fill keys in precedence order
pub const FILL_KEYS: &[(&str, FillShape)] = &[
    ("filled_level", FillShape::Percent),
    ("filled_level_percent", FillShape::Percent),
    ("filledLevel", FillShape::AutoInRange),
    ("distance", FillShape::Distance),
    ("distance_cm", FillShape::Distance),
    ("filledLevel", FillShape::Auto),
];

/// Parse a raw message body and normalize it
pub fn normalize_bytes(body: &[u8]) -> Result<(String, ReadingDelta), IngestError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| IngestError::MalformedPayload(e.to_string()))?;
    normalize(&value)
}

/// Normalize a decoded payload into a bin id and the delta to apply
pub fn normalize(payload: &Value) -> Result<(String, ReadingDelta), IngestError> {
    let object = payload.as_object().ok_or(IngestError::UnidentifiedPayload)?;
    let id = find_id(object).ok_or(IngestError::UnidentifiedPayload)?;

    let delta = ReadingDelta {
        fill: find_fill(object)?,
        temperature: number(object, "temperature")?,
        latitude: number(object, "latitude")?,
        longitude: number(object, "longitude")?,
        height: number(object, "height")?,
    };

    Ok((id, delta))
}

fn find_id(object: &Map<String, Value>) -> Option<String> {
    ID_KEYS.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    })
}

fn find_fill(object: &Map<String, Value>) -> Result<Option<FillInput>, IngestError> {
    for (key, shape) in FILL_KEYS {
        let Some(value) = number(object, key)? else {
            continue;
        };

        let input = match shape {
            FillShape::Percent => FillInput::Percent(value),
            FillShape::Distance => FillInput::Distance(value),
            FillShape::AutoInRange if (0.0..=100.0).contains(&value) => FillInput::Auto(value),
            FillShape::AutoInRange => continue,
            FillShape::Auto => FillInput::Auto(value),
        };
        return Ok(Some(input));
    }

    Ok(None)
}

/// Read a numeric field, accepting JSON numbers and numeric strings
///
/// `null` and empty strings count as absent.
fn number(object: &Map<String, Value>, key: &str) -> Result<Option<f64>, IngestError> {
    let field = field_name(key);

    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| IngestError::invalid(field, format!("unrepresentable number {n}"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(IngestError::invalid(field, format!("not a number: {s:?}"))),
        },
        Some(other) => Err(IngestError::invalid(
            field,
            format!("expected a number, got {}", type_name(other)),
        )),
    }
}

fn field_name(key: &str) -> &'static str {
    match key {
        "temperature" => "temperature",
        "latitude" => "latitude",
        "longitude" => "longitude",
        "height" => "height",
        _ => "fill",
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
