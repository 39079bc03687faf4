//! Cache module for storing search responses to disk
//!
//! This module provides a cache manager that persists raw API responses to the
//! filesystem, one file per query key, and a read-through wrapper that only
//! contacts the flight search API when no file exists yet. Entries never expire.

mod manager;

pub use manager::{CacheError, CacheManager, CachePolicy, OfferCache};
