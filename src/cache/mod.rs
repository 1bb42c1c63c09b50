//! Key/value caching with per-entry expiration.
//!
//! [`Cache`] is the contract; [`MemoryCache`] is the in-process store used
//! to shield the weather provider and hot read paths.

pub mod memory;

use std::time::Duration;

pub use memory::MemoryCache;

/// Expiration requested for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Use the store's default expiration.
    Default,
    /// Keep the entry until it is deleted.
    Never,
    /// Expire after the given duration.
    For(Duration),
}

/// Get/set/delete store whose entries may expire.
///
/// Expired entries are never returned by [`Cache::get`], whether or not
/// they have been physically removed yet.
pub trait Cache<V>: Send + Sync + std::fmt::Debug {
    /// Returns the live value for `key`, if any.
    fn get(&self, key: &str) -> Option<V>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: V, ttl: Ttl);

    /// Removes `key`. Missing keys are ignored.
    fn delete(&self, key: &str);
}
