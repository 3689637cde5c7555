//! Byte-budgeted resource cache with least-recently-used eviction.

mod byte_cache;
mod entry;

pub use byte_cache::{ByteSizedCache, CacheStats, EvictionReport};
pub use entry::CacheEntry;
