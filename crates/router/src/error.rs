use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("indexer error: {0}")]
    Indexer(#[from] hive_indexer::IndexerError),

    #[error("store error: {0}")]
    Store(#[from] hive_vector_store::StoreError),

    #[error("invalid route: {0}")]
    InvalidRoute(String),
}
