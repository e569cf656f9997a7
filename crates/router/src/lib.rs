//! # Hive Router
//!
//! Maps a natural-language request to the most appropriate `skill.command`:
//!
//! - [`HiveRouter`] — explicit-pattern, then semantic, then context-aware
//!   routing; `None` means "escalate to the planner".
//! - [`OmniRouter`] — the facade wiring indexer, hybrid search, the LRU+TTL
//!   [`SearchCache`], the hive router, and the [`IntentSniffer`].
//! - [`SkillDiscoveryService`] — the holographic registry: tool metadata
//!   projected on demand from the store, never held as a parallel source of
//!   truth in memory.

mod cache;
mod discovery;
mod error;
mod hive;
mod omni;
mod route;
mod semantic;
mod sniffer;

pub use cache::{CacheStats, SearchCache};
pub use discovery::{
    generate_usage_template, SkillDiscoveryService, SkillSummary, ToolMatch, ToolRecord,
};
pub use error::{Result, RouterError};
pub use hive::{HiveRouter, RouteContext};
pub use omni::{OmniRouter, RouterSettings, RouterStats};
pub use route::{RouteConfidence, RouteResult};
pub use semantic::SemanticRouter;
pub use sniffer::{ActivationRule, DeclarativeRule, IntentSniffer, RuleSpec, SnifferFn};
