use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("store error: {0}")]
    Backend(String),

    #[error("invalid payload at {field}: {message}")]
    InvalidPayload { field: String, message: String },

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn payload(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            field: field.into(),
            message: message.into(),
        }
    }
}
