//! Error types
//!
//! Each subsystem has its own error enum; [`Error`] wraps them for callers
//! that drive the whole service.

use crate::mqtt::MqttError;
use crate::registry::RegistryError;

/// Result alias using the crate-level [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors on the telemetry ingestion path
///
/// These never escape the ingestion loop: the offending reading is logged
/// and dropped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    /// A telemetry field was present but not numeric
    #[error("invalid reading for field `{field}`: {reason}")]
    InvalidReading { field: &'static str, reason: String },

    /// No identifier alias carried a usable value
    #[error("payload has no bin identifier")]
    UnidentifiedPayload,

    /// The message body was not valid JSON
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl IngestError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        IngestError::InvalidReading {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors returned to callers of the query surface
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("bin not found: {0}")]
    NotFound(String),

    #[error("no telemetry data available yet")]
    NoDataYet,
}

impl From<RegistryError> for QueryError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => QueryError::NotFound(id),
        }
    }
}

/// Broker connection errors
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Endpoint is empty or does not look like a broker address
    #[error("broker misconfigured: {0}")]
    Misconfigured(String),

    /// Hostname cannot be resolved
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    /// Temporary failure; the connection will be retried
    #[error("broker transient error: {0}")]
    Transient(String),

    #[error("broker protocol error: {0}")]
    Protocol(#[from] MqttError),
}

impl BrokerError {
    /// Fatal errors switch the gateway to simulation mode for good
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrokerError::Misconfigured(_) | BrokerError::Unreachable(_))
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(err: std::io::Error) -> Self {
        BrokerError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BrokerError::Misconfigured("x".into()).is_fatal());
        assert!(BrokerError::Unreachable("x".into()).is_fatal());
        assert!(!BrokerError::Transient("x".into()).is_fatal());
        assert!(!BrokerError::Protocol(MqttError::MalformedRemainingLength).is_fatal());
    }

    #[test]
    fn test_registry_error_maps_to_not_found() {
        let err: QueryError = RegistryError::NotFound("Bin_404".into()).into();
        assert_eq!(err, QueryError::NotFound("Bin_404".into()));
    }

    #[test]
    fn test_invalid_reading_display() {
        let err = IngestError::invalid("temperature", "expected a number");
        assert_eq!(
            err.to_string(),
            "invalid reading for field `temperature`: expected a number"
        );
    }
}
