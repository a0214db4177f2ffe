//! Admin request bodies

use serde::Deserialize;

use crate::telemetry::ReadingDelta;

/// Manual field update
///
/// The fill value is always taken as a percentage, never as a distance.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AdminUpdate {
    #[serde(
        default,
        alias = "fillPercent",
        alias = "filled_level",
        alias = "filledLevel"
    )]
    pub fill_percent: Option<f64>,

    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,
}

impl AdminUpdate {
    pub fn is_empty(&self) -> bool {
        self.fill_percent.is_none()
            && self.temperature.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }

    pub fn to_delta(&self) -> ReadingDelta {
        let mut delta = ReadingDelta::new();
        if let Some(fill) = self.fill_percent {
            delta = delta.percent(fill);
        }
        delta.temperature = self.temperature;
        delta.latitude = self.latitude;
        delta.longitude = self.longitude;
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::FillInput;

    #[test]
    fn test_aliases_are_percent() {
        for body in [
            r#"{"fillPercent": 60}"#,
            r#"{"filled_level": 60}"#,
            r#"{"filledLevel": 60}"#,
            r#"{"fill_percent": 60}"#,
        ] {
            let update: AdminUpdate = serde_json::from_str(body).unwrap();
            assert_eq!(update.to_delta().fill, Some(FillInput::Percent(60.0)));
        }
    }

    #[test]
    fn test_large_value_is_not_a_distance() {
        let update: AdminUpdate = serde_json::from_str(r#"{"filledLevel": 250}"#).unwrap();
        assert_eq!(update.to_delta().fill, Some(FillInput::Percent(250.0)));
    }

    #[test]
    fn test_empty() {
        let update: AdminUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());
        assert!(update.to_delta().is_empty());

        let update: AdminUpdate = serde_json::from_str(r#"{"temperature": 21.5}"#).unwrap();
        assert!(!update.is_empty());
    }
}
