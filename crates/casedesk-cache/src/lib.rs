//! # Casedesk Cache
//!
//! In-process caching for the Casedesk API.
//!
//! This crate provides:
//! - [`TtlCache`]: a concurrent map whose entries expire after a fixed TTL
//! - [`keys`]: cache key builders
//!
//! The cache lives in one process. Several API instances each keep their own
//! copy, so staleness across instances is bounded by the TTL.
//!
//! # Example
//!
//! ```ignore
//! use casedesk_cache::{TtlCache, keys};
//! use std::time::Duration;
//!
//! let cache: TtlCache<SystemParameter> = TtlCache::new(Duration::from_secs(300));
//! cache.insert(keys::parameters::by_key("app.name"), parameter);
//! let hit = cache.get(&keys::parameters::by_key("app.name"));
//! ```

pub mod keys;
pub mod ttl;

pub use ttl::{CacheLookup, CacheStats, TtlCache};
