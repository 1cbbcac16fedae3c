//! # confgov-cache
//!
//! The per-process configuration cache and the service that keeps it in
//! step with the durable store.
//!
//! - [`ConfigCache`] - lock-guarded `key -> group<>value` map
//! - [`CacheRefreshService`] - warms the cache on start, replaces it on a
//!   timer, and offers an explicit [`refresh_now`](CacheRefreshService::refresh_now)
//!
//! Writes go to the store first and then to the cache for the affected key;
//! the refresher is the backstop for anything the write-through path missed.

pub mod cache;
pub mod refresh;

pub use cache::ConfigCache;
pub use refresh::{CacheRefreshService, RefreshConfig, RefreshStats};
