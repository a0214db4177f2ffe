//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No bin with this id has been registered or seen in telemetry
    #[error("Bin not found: {0}")]
    NotFound(String),
}
