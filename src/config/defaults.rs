//! Default values for configuration fields
//!
//! This module centralizes all default value functions used in serde deserialization.

use std::time::Duration;

use crate::cache::ttl::MaxAge;

/// Default max age of cached artifacts (24 hours)
#[inline]
pub fn content_max_age() -> MaxAge {
    MaxAge::from_secs(24 * 3600)
}

/// Default max age of cached metadata (24 hours)
#[inline]
pub fn metadata_max_age() -> MaxAge {
    MaxAge::from_secs(24 * 3600)
}

/// Negative cache is on unless configured off
#[inline]
pub fn negative_cache_enabled() -> bool {
    true
}

/// Default negative cache TTL in seconds (24 hours)
#[inline]
pub fn negative_cache_ttl() -> i64 {
    24 * 3600
}

#[inline]
pub fn online() -> bool {
    true
}

#[inline]
pub fn auto_block() -> bool {
    true
}

/// First auto-block window: twice a 20s connection timeout
#[inline]
pub fn auto_block_initial_window() -> Duration {
    Duration::from_secs(40)
}

/// Upper bound for growing auto-block windows (1 hour)
#[inline]
pub fn auto_block_max_window() -> Duration {
    Duration::from_secs(3600)
}
