//! Caching infrastructure.
//!
//! - **LRU Cache**: generic sharded LRU cache with pinning handles
//! - **Table Cache**: open SSTable readers, located across data directories

mod lru;
mod table_cache;

pub use lru::{CacheHandle, CacheStats, LruCache};
pub use table_cache::{search_dirs, TableAndFile, TableCache, TableHandle};
