//! Telemetry ingestion
//!
//! ```text
//!   broker ──► IngestionGateway ──┐
//!                                 ├──► mpsc ──► Updater ──► BinService
//!   Simulator (fallback) ─────────┘                          (registry + fan-out)
//! ```

pub mod config;
pub mod endpoint;
pub mod gateway;
pub mod simulator;
pub mod state;
pub mod updater;

pub use config::GatewayConfig;
pub use endpoint::{BrokerEndpoint, Transport};
pub use gateway::{GatewayHandle, IngestionGateway};
pub use simulator::{perturb, Simulator};
pub use state::{GatewayState, StateTracker};
pub use updater::{Inbound, Updater};
