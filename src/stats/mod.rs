//! Statistics for the ingestion pipeline

pub mod metrics;

pub use metrics::{IngestStats, IngestStatsSnapshot};
