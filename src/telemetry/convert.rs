//! Fill level unit conversion
//!
//! Sensors report the distance from the lid to the refuse surface, while
//! admin tools report a percentage. Both end up as a whole percentage in
//! `[0, 100]`:
//!
//! ```text
//!   ┌──────────┐ ─┬─
//!   │  sensor  │  │ distance
//!   │          │ ─┴─           percent = (height - distance) / height * 100
//!   │▓▓▓▓▓▓▓▓▓▓│  │
//!   │▓▓▓▓▓▓▓▓▓▓│  │ fill
//!   └──────────┘ ─┴─
//! ```

use crate::error::IngestError;

/// Calibrated bin height in centimeters used when a bin has none
pub const DEFAULT_BIN_HEIGHT: f64 = 38.0;

/// Resolve the height used for conversion
///
/// Zero, negative and non-finite heights fall back to [`DEFAULT_BIN_HEIGHT`].
pub fn effective_height(height: Option<f64>) -> f64 {
    match height {
        Some(h) if h.is_finite() && h > 0.0 => h,
        _ => DEFAULT_BIN_HEIGHT,
    }
}

/// Convert an ambiguous reading into a fill percentage
///
/// Values in `[0, 100]` are taken as a percentage already. Anything else is
/// a raw distance and goes through [`distance_to_percent`].
///
/// Note that a genuine distance below 100 cm is indistinguishable from a
/// percentage under this rule; callers that know the reading is a distance
/// should call [`distance_to_percent`] directly.
pub fn to_percent(value: f64, height: f64) -> Result<u8, IngestError> {
    check_finite(value)?;

    if (0.0..=100.0).contains(&value) {
        return Ok(value.round() as u8);
    }

    distance_to_percent(value, height)
}

/// Convert a raw sensor distance (cm) into a fill percentage
///
/// A smaller distance means a fuller bin.
pub fn distance_to_percent(distance: f64, height: f64) -> Result<u8, IngestError> {
    check_finite(distance)?;

    let height = effective_height(Some(height));
    let percent = ((height - distance) / height) * 100.0;

    Ok(percent.round().clamp(0.0, 100.0) as u8)
}

/// Round and clamp a value that is already a percentage
pub fn clamp_percent(value: f64) -> Result<u8, IngestError> {
    check_finite(value)?;
    Ok(value.round().clamp(0.0, 100.0) as u8)
}

fn check_finite(value: f64) -> Result<(), IngestError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(IngestError::invalid("fill", format!("non-finite value {value}")))
    }
}
