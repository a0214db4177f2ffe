//! Per-bin state stored in the registry

use serde::{Deserialize, Serialize};

use crate::telemetry::convert::{clamp_percent, distance_to_percent, effective_height};
use crate::telemetry::ReadingDelta;

/// Current state of a tracked bin
///
/// Handed out by the registry as a snapshot; mutating a returned `Bin` has no
/// effect on the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    /// Stable external identifier
    pub id: String,

    /// Fill level in `[0, 100]`, if known
    #[serde(rename = "filled_level")]
    pub fill_percent: Option<u8>,

    /// Last raw sensor distance in centimeters, kept for diagnostics
    #[serde(rename = "distance")]
    pub raw_distance: Option<f64>,

    /// Degrees Celsius
    pub temperature: Option<f64>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    /// Calibrated height in centimeters
    pub height: f64,
}

impl Bin {
    /// Create an empty bin with the given height
    pub fn new(id: impl Into<String>, height: f64) -> Self {
        Self {
            id: id.into(),
            fill_percent: None,
            raw_distance: None,
            temperature: None,
            latitude: None,
            longitude: None,
            height: effective_height(Some(height)),
        }
    }

    /// Create a bin from a registration request
    pub(super) fn from_registration(id: &str, reg: &Registration, default_height: f64) -> Self {
        let height = reg
            .height
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(default_height);
        let mut bin = Bin::new(id, height);
        bin.fill_percent = reg.fill_percent.and_then(|v| clamp_percent(v).ok());
        bin.temperature = reg.temperature.filter(|v| v.is_finite());
        bin.latitude = reg.latitude.filter(|v| v.is_finite());
        bin.longitude = reg.longitude.filter(|v| v.is_finite());
        bin
    }

    /// Merge a delta into this bin
    ///
    /// The height is applied first so a distance in the same delta converts
    /// against it. A percent input clears the stored raw distance; a distance
    /// input replaces both. A height change without a fill input re-derives
    /// the fill level from the stored raw distance. Non-finite values are
    /// skipped.
    pub(super) fn apply(&mut self, delta: &ReadingDelta) {
        let mut height_changed = false;
        if let Some(height) = delta.height.filter(|h| h.is_finite() && *h > 0.0) {
            height_changed = height != self.height;
            self.height = height;
        }

        if height_changed && delta.fill.is_none() {
            if let Some(distance) = self.raw_distance {
                match distance_to_percent(distance, self.height) {
                    Ok(percent) => self.fill_percent = Some(percent),
                    Err(e) => {
                        tracing::warn!(bin = %self.id, error = %e, "Cannot recalibrate fill level");
                    }
                }
            }
        }

        if let Some(fill) = delta.fill {
            match fill.to_percent(self.height) {
                Ok(percent) => {
                    self.fill_percent = Some(percent);
                    self.raw_distance = fill.raw_distance();
                }
                Err(e) => {
                    tracing::warn!(bin = %self.id, error = %e, "Skipping fill input");
                }
            }
        }

        if let Some(t) = delta.temperature.filter(|v| v.is_finite()) {
            self.temperature = Some(t);
        }
        if let Some(lat) = delta.latitude.filter(|v| v.is_finite()) {
            self.latitude = Some(lat);
        }
        if let Some(lon) = delta.longitude.filter(|v| v.is_finite()) {
            self.longitude = Some(lon);
        }
    }
}

/// Initial fields for an explicitly registered bin
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub height: Option<f64>,

    #[serde(default, alias = "filled_level", alias = "fillPercent")]
    pub fill_percent: Option<f64>,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Registration {
    pub fn with_height(height: f64) -> Self {
        Self {
            height: Some(height),
            ..Default::default()
        }
    }
}
