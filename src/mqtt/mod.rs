//! Minimal MQTT 3.1.1 client
//!
//! Covers what the ingestion gateway needs from a broker: connect, subscribe,
//! receive publishes, and stay alive, over plain TCP or TLS. No outbound
//! publishing and no session persistence.

pub mod client;
pub mod error;
pub mod packet;
pub mod tls;

pub use client::{connect_tcp, MqttClient, MqttOptions};
pub use error::MqttError;
pub use packet::{ConnectReturnCode, Packet, Publish, QoS};
pub use tls::{TlsConnector, TlsFiles};
