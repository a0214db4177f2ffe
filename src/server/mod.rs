//! HTTP and WebSocket surface
//!
//! ```text
//!   GET  /subscribe            latest bin event
//!   GET  /bins                 all bins
//!   POST /bins                 register a bin
//!   PUT  /bins/:id             manual update
//!   POST /bins/:id/simulate    manual simulated update
//!   GET  /stats                ingestion counters
//!   GET  /ws                   realtime event stream
//! ```
//!
//! Every route is served under both `/api/iot` and `/iot`.

pub mod config;
pub mod listener;
pub mod routes;
mod ws;

pub use config::{Config, ServerConfig};
pub use listener::BinServer;
pub use routes::{router, AppState};
