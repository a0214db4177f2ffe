//! Registry configuration

use crate::telemetry::DEFAULT_BIN_HEIGHT;

/// Configuration for the bin registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Height assigned to bins created without one (cm)
    pub default_height: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_height: DEFAULT_BIN_HEIGHT,
        }
    }
}

impl RegistryConfig {
    /// Set the default bin height
    ///
    /// Non-positive values are ignored.
    pub fn default_height(mut self, height: f64) -> Self {
        if height.is_finite() && height > 0.0 {
            self.default_height = height;
        }
        self
    }
}
