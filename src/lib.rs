//! Waste bin telemetry ingestion and realtime fan-out
//!
//! Sensor readings arrive over MQTT in several payload shapes. They are
//! normalized into one canonical reading, merged into an in-memory registry,
//! and pushed to every connected observer.
//!
//! ```text
//!   MQTT broker ──► ingest ──► telemetry::normalize ──► registry ──► fanout ──► /ws
//!        ╎                                                  │
//!   (unreachable)                                           └──► query ──► HTTP
//!        ▼
//!   simulator
//! ```
//!
//! # Example
//!
//! ```no_run
//! use binwatch::{BinServer, Config};
//!
//! #[tokio::main]
//! async fn main() -> binwatch::Result<()> {
//!     let server = BinServer::new(Config::from_env()?);
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod fanout;
pub mod ingest;
pub mod mqtt;
pub mod query;
pub mod registry;
pub mod server;
pub mod stats;
pub mod telemetry;

pub use error::{BrokerError, Error, IngestError, QueryError, Result};
pub use fanout::{BinEvent, FanoutHub};
pub use ingest::{GatewayConfig, GatewayState, IngestionGateway};
pub use query::{AdminUpdate, BinService};
pub use registry::{Bin, BinRegistry, Registration, RegistryConfig};
pub use server::{BinServer, Config, ServerConfig};
