//! Age-based expiry
//!
//! ## Boundary convention
//! Expiry is **inclusive**: an entry verified at `t` with TTL `T` is expired at
//! every instant `now >= t + T`. A TTL of zero therefore expires immediately,
//! even when checked in the same millisecond the entry was verified.
//!
//! | elapsed      | TTL 60s  |
//! |--------------|----------|
//! | 59.999s      | fresh    |
//! | 60s exactly  | expired  |
//! | 61s          | expired  |
//!
//! Timestamps in the future (clock skew) count as zero elapsed time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Check if an entry verified at `verified_at_millis` has outlived `ttl_millis`
///
/// # Examples
/// ```
/// use repo_proxy_cache::cache::ttl::is_expired;
///
/// assert!(!is_expired(1_000, 500, 1_499)); // 499ms old, 500ms TTL
/// assert!(is_expired(1_000, 500, 1_500));  // exactly at the boundary
/// assert!(is_expired(1_000, 0, 1_000));    // zero TTL expires immediately
/// ```
#[inline]
#[must_use]
pub const fn is_expired(verified_at_millis: u64, ttl_millis: u64, now_millis: u64) -> bool {
    now_millis.saturating_sub(verified_at_millis) >= ttl_millis
}

/// Milliseconds in `duration`, saturating at `u64::MAX`
#[inline]
#[must_use]
pub const fn saturating_millis(duration: Duration) -> u64 {
    let millis = duration.as_millis();
    if millis > u64::MAX as u128 {
        u64::MAX
    } else {
        millis as u64
    }
}

/// Maximum age of a cached resource before it must be re-verified
///
/// Configured in seconds; any negative value means [`MaxAge::Never`], i.e. only
/// explicit invalidation marks content stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxAge {
    /// Never expire by age
    Never,
    /// Expire once this much time has passed since last verification
    After(Duration),
}

impl MaxAge {
    /// Build from a signed number of seconds (negative disables age expiry)
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        if secs < 0 {
            Self::Never
        } else {
            Self::After(Duration::from_secs(secs as u64))
        }
    }

    /// Signed seconds, `-1` for [`MaxAge::Never`]
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        match self {
            Self::Never => -1,
            Self::After(d) => d.as_secs() as i64,
        }
    }

    /// TTL in milliseconds, `None` if age never expires
    #[must_use]
    #[inline]
    pub const fn as_millis(&self) -> Option<u64> {
        match self {
            Self::Never => None,
            Self::After(d) => Some(saturating_millis(*d)),
        }
    }

    /// Whether something verified at `verified_at_millis` is too old at `now_millis`
    #[must_use]
    #[inline]
    pub const fn is_exceeded(&self, verified_at_millis: u64, now_millis: u64) -> bool {
        match self.as_millis() {
            None => false,
            Some(ttl) => is_expired(verified_at_millis, ttl, now_millis),
        }
    }
}

impl Default for MaxAge {
    /// 24 hours
    fn default() -> Self {
        Self::After(Duration::from_secs(24 * 60 * 60))
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::After(d) => write!(f, "{}s", d.as_secs()),
        }
    }
}

impl Serialize for MaxAge {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.as_secs())
    }
}

impl<'de> Deserialize<'de> for MaxAge {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = i64::deserialize(deserializer)?;
        Ok(Self::from_secs(secs))
    }
}
