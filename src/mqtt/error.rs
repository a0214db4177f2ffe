//! MQTT error types

use super::packet::ConnectReturnCode;

/// Errors from the MQTT codec and client
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed remaining length")]
    MalformedRemainingLength,

    #[error("packet of {0} bytes exceeds the maximum size")]
    PacketTooLarge(usize),

    #[error("invalid packet type {0:#04x}")]
    InvalidPacketType(u8),

    #[error("invalid QoS {0}")]
    InvalidQos(u8),

    #[error("truncated {0} packet")]
    Truncated(&'static str),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("connection refused: {0}")]
    ConnectionRefused(ConnectReturnCode),

    #[error("subscription to {0} rejected")]
    SubscriptionRejected(String),

    #[error("unexpected {0} packet")]
    UnexpectedPacket(&'static str),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("no ping response within keep-alive interval")]
    KeepAliveTimeout,

    #[error("connection closed by broker")]
    ConnectionClosed,

    /// Certificates or keys could not be loaded
    #[error("TLS configuration: {0}")]
    TlsConfig(String),
}
