//! Key-value cache with TTL expiry and list values.
//!
//! Backs both the object cache (one serialized row per entity) and the search
//! cache (one ordered id list per query).

pub mod clock;
pub mod keys;
pub mod memory;
pub mod slice;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryCache;
pub use slice::slice_window;

use std::time::Duration;

use crate::core::Result;

/// Operations consumed from the shared cache.
///
/// Implementations must tolerate concurrent use from independent units of work.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value`; `ttl = None` keeps it until deleted.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// Sets a TTL on an existing key. Returns false when the key is absent.
    fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    fn delete(&self, key: &str) -> Result<bool>;

    /// Appends `values` to the list at `key` and returns the new length.
    fn list_push(&self, key: &str, values: &[String]) -> Result<usize>;

    fn list_len(&self, key: &str) -> Result<usize>;

    /// Offset/length slice of the list at `key`, see [`slice_window`].
    fn list_slice(&self, key: &str, offset: i64, limit: Option<i64>) -> Result<Vec<String>>;
}
