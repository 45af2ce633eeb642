use thiserror::Error;

/// Error types for the proctoring alert service
#[derive(Debug, Error)]
pub enum ProctorError {
    /// Persistence errors
    #[error("Alert store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Exam catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Dashboard errors
    #[error("Dashboard aggregation failed: {0}")]
    AggregationFailed(String),

    /// Channel errors
    #[error("Invalid channel message: {0}")]
    InvalidMessage(String),

    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results using ProctorError
pub type Result<T> = std::result::Result<T, ProctorError>;

impl ProctorError {
    /// Helper to create Internal errors with context
    pub fn internal(msg: impl Into<String>) -> Self {
        ProctorError::Internal(msg.into())
    }

    /// Helper to create store errors
    pub fn store(msg: impl Into<String>) -> Self {
        ProctorError::StoreUnavailable(msg.into())
    }

    /// Helper to create catalog errors
    pub fn catalog(msg: impl Into<String>) -> Self {
        ProctorError::CatalogUnavailable(msg.into())
    }

    /// Wraps any read failure behind the dashboard into a single aggregation error
    pub fn aggregation(source: ProctorError) -> Self {
        match source {
            ProctorError::AggregationFailed(_) => source,
            other => ProctorError::AggregationFailed(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ProctorError {
    fn from(err: rusqlite::Error) -> Self {
        ProctorError::StoreUnavailable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ProctorError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProctorError::Internal(format!("Blocking task failed: {}", err))
    }
}
