//! # Hive Indexer
//!
//! Builds the vector index of skills and commands the routers search over.
//!
//! One document per command (weight 2.0) plus one optional document per
//! skill (weight 1.0), embedded in a batch and committed to the store in a
//! single `add_documents` call. An MD5 fingerprint of the skill set is
//! persisted next to the store; an unchanged fingerprint skips the whole
//! rebuild, which is the difference between a cold start measured in
//! minutes and one measured in seconds.

mod error;
mod indexer;
mod memory_index;
mod meta;
mod skill;

pub use error::{IndexerError, Result};
pub use indexer::{IndexStats, SkillIndexer};
pub use memory_index::MemoryIndex;
pub use meta::IndexMeta;
pub use skill::{CommandSpec, SkillSpec};
