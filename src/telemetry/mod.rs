//! Telemetry normalization
//!
//! Pure transforms from inbound payloads to canonical readings. Nothing here
//! touches the registry.

pub mod convert;
pub mod normalize;
pub mod reading;

pub use convert::{clamp_percent, distance_to_percent, to_percent, DEFAULT_BIN_HEIGHT};
pub use normalize::{normalize, normalize_bytes};
pub use reading::{FillInput, ReadingDelta};
