use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("schema violation at {location}: {message}")]
    SchemaViolation { location: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtocolError {
    pub fn schema(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            location: location.into(),
            message: message.into(),
        }
    }
}
