//! Fan-out event types

use serde::{Deserialize, Serialize};

use crate::registry::Bin;

/// Name of the event observers listen for
pub const BIN_EVENT_NAME: &str = "mqttData";

/// A bin update pushed to observers
///
/// The fill level is emitted under both `filledLevel` and `filled_level`;
/// older dashboards read one, newer ones the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinEvent {
    #[serde(rename = "binId")]
    pub bin_id: String,

    #[serde(rename = "filledLevel")]
    pub fill_percent: Option<u8>,

    #[serde(rename = "filled_level")]
    pub fill_percent_alt: Option<u8>,

    pub distance: Option<f64>,

    pub temperature: Option<f64>,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,
}

impl From<&Bin> for BinEvent {
    fn from(bin: &Bin) -> Self {
        Self {
            bin_id: bin.id.clone(),
            fill_percent: bin.fill_percent,
            fill_percent_alt: bin.fill_percent,
            distance: bin.raw_distance,
            temperature: bin.temperature,
            latitude: bin.latitude,
            longitude: bin.longitude,
        }
    }
}

/// Envelope sent over the observer socket
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope<'a> {
    pub event: &'static str,
    pub data: &'a BinEvent,
}

impl<'a> EventEnvelope<'a> {
    pub fn new(data: &'a BinEvent) -> Self {
        Self {
            event: BIN_EVENT_NAME,
            data,
        }
    }
}
