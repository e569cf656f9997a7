//! # Hive Vector Store
//!
//! Contracts the routing core consumes but does not own:
//!
//! - [`VectorStore`] — the native hybrid search engine (dense vectors +
//!   BM25 keyword index behind one handle). One instance per storage path,
//!   shared process-wide; callers hold non-owning `Arc` references.
//! - [`EmbeddingService`] — batch text embedding.
//! - [`parse_tool_search_payload`] — strict canonicalization of native rows
//!   into [`ToolSearchPayload`] for the routing pipeline.
//!
//! The in-process [`MemoryVectorStore`] implements the same contract with
//! keyword-overlap ranking; it backs tests and degraded deployments where
//! the native engine is unavailable.

mod embeddings;
mod error;
mod memory;
mod payload;
mod store;

pub use embeddings::EmbeddingService;
pub use error::{Result, StoreError};
pub use memory::MemoryVectorStore;
pub use payload::{parse_tool_search_payload, ToolSearchPayload};
pub use store::{
    AgenticSearchRequest, DocumentBatch, SearchProfile, TableInfo, ToolSearchRequest, VectorStore,
};
