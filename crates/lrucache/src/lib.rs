//! # lrucache
//!
//! Fixed-capacity, thread-safe LRU cache.
//!
//! ## Architecture
//! - **Index**: AHash map from key to list handle (O(1) lookup)
//! - **Recency list**: index-linked doubly-linked list, most recent at the head (O(1) promote/evict)
//! - **Lock**: one `parking_lot::Mutex` guards index and list together
//!
//! ## Example
//!
//! ```
//! use lrucache::LruCache;
//!
//! let cache = LruCache::new(2).unwrap();
//! assert!(!cache.set("aaa", 100));
//! assert!(!cache.set("bbb", 200));
//! assert_eq!(cache.get("aaa"), Some(100));
//!
//! // "bbb" is now the coldest entry and gets evicted
//! cache.set("ccc", 300);
//! assert_eq!(cache.get("bbb"), None);
//! ```

#![warn(missing_docs)]

mod cache;
mod error;
mod list;
mod stats;

pub use cache::LruCache;
pub use error::{Error, Result};
pub use list::{Iter as ListIter, NodeHandle, RecencyList};
pub use stats::{CacheStats, StatsSnapshot};
