//! # Geographic Intelligence Module
//!
//! ## Purpose
//! Everything state-level: the fixed state-code vocabulary, the offline
//! complaint-count index built from the ODI flat dump, the batch indexer
//! that builds it, and the resolver that chooses between live and offline
//! counts per query.
//!
//! ## Architecture
//! - `states`: valid-state set and state-code normalization
//! - `index`: persisted offline geo index (read side + atomic install)
//! - `indexer`: offline batch job over the FLAT_CMPL dump
//! - `resolver`: LIVE vs OFFLINE_FALLBACK resolution with provenance

pub mod states;
pub mod index;
pub mod indexer;
pub mod resolver;

pub use index::GeoIndexStore;
pub use indexer::{FlatFileIndexer, IndexerStats};
pub use resolver::{GeoProvenance, GeoResolver, GeoSummary};
