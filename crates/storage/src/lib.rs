//! Correction caching for the boundary tile proxy.
//!
//! Provides:
//! - [`CorrectionSet`], the decoded correction layers of one tile
//! - [`CorrectionCache`], a bounded LRU with at-most-one computation per tile

pub mod correction_cache;
pub mod correction_set;

pub use correction_cache::{
    CacheError, CacheOutcome, CacheResult, CacheStatsSnapshot, CorrectionCache,
    CorrectionCacheStats,
};
pub use correction_set::{CorrectionLayer, CorrectionSet};
