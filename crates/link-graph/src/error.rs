use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkGraphError>;

#[derive(Error, Debug)]
pub enum LinkGraphError {
    #[error("schema violation at {location}: {message}")]
    SchemaViolation { location: String, message: String },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("timed out after {0:.3}s")]
    Timeout(f64),

    #[error(transparent)]
    Protocol(#[from] hive_protocol::ProtocolError),

    #[error(transparent)]
    Store(#[from] hive_vector_store::StoreError),
}

impl LinkGraphError {
    pub fn schema(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            location: location.into(),
            message: message.into(),
        }
    }
}
