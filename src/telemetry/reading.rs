//! Canonical reading types

use crate::error::IngestError;

use super::convert::{clamp_percent, distance_to_percent, to_percent};

/// A fill level input tagged by how it should be interpreted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillInput {
    /// Already a percentage; rounded and clamped only
    Percent(f64),
    /// Raw distance from sensor to surface in centimeters
    Distance(f64),
    /// Unknown shape; `[0, 100]` is a percentage, anything else a distance
    Auto(f64),
}

impl FillInput {
    /// Resolve to a percentage using the given bin height
    pub fn to_percent(self, height: f64) -> Result<u8, IngestError> {
        match self {
            FillInput::Percent(v) => clamp_percent(v),
            FillInput::Distance(v) => distance_to_percent(v, height),
            FillInput::Auto(v) => to_percent(v, height),
        }
    }

    /// The raw distance to retain for diagnostics, if this input carries one
    pub fn raw_distance(self) -> Option<f64> {
        match self {
            FillInput::Percent(_) => None,
            FillInput::Distance(v) => Some(v),
            FillInput::Auto(v) if (0.0..=100.0).contains(&v) => None,
            FillInput::Auto(v) => Some(v),
        }
    }
}

/// Partial update derived from one inbound payload
///
/// Absent fields leave the corresponding bin field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingDelta {
    pub fill: Option<FillInput>,
    pub temperature: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub height: Option<f64>,
}

impl ReadingDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fill percentage
    pub fn percent(mut self, value: f64) -> Self {
        self.fill = Some(FillInput::Percent(value));
        self
    }

    /// Set a raw distance reading
    pub fn distance(mut self, value: f64) -> Self {
        self.fill = Some(FillInput::Distance(value));
        self
    }

    pub fn temperature(mut self, value: f64) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn height(mut self, value: f64) -> Self {
        self.height = Some(value);
        self
    }

    /// Whether applying this delta would change nothing
    pub fn is_empty(&self) -> bool {
        self.fill.is_none()
            && self.temperature.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.height.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_input_resolution() {
        assert_eq!(FillInput::Percent(150.0).to_percent(38.0).unwrap(), 100);
        assert_eq!(FillInput::Distance(10.0).to_percent(38.0).unwrap(), 74);
        assert_eq!(FillInput::Auto(10.0).to_percent(38.0).unwrap(), 10);
        assert_eq!(FillInput::Auto(120.0).to_percent(200.0).unwrap(), 40);
    }

    #[test]
    fn test_raw_distance_retention() {
        assert_eq!(FillInput::Percent(40.0).raw_distance(), None);
        assert_eq!(FillInput::Distance(12.0).raw_distance(), Some(12.0));
        assert_eq!(FillInput::Auto(40.0).raw_distance(), None);
        assert_eq!(FillInput::Auto(140.0).raw_distance(), Some(140.0));
    }

    #[test]
    fn test_builder() {
        let delta = ReadingDelta::new()
            .distance(10.0)
            .height(38.0)
            .temperature(21.5)
            .location(29.0, 80.0);

        assert_eq!(delta.fill, Some(FillInput::Distance(10.0)));
        assert_eq!(delta.height, Some(38.0));
        assert_eq!(delta.temperature, Some(21.5));
        assert_eq!(delta.latitude, Some(29.0));
        assert_eq!(delta.longitude, Some(80.0));
        assert!(!delta.is_empty());
        assert!(ReadingDelta::new().is_empty());
    }
}
