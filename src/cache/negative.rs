//! Negative cache: recently confirmed "not found" answers from the origin
//!
//! Independent of the positive cache controllers. Entries expire lazily on
//! lookup; there is no background sweeper. Concurrent access goes through a
//! sharded [`DashMap`], so readers of different keys never contend and a
//! check-then-insert race costs at most one extra remote call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, trace};

use super::ttl::{is_expired, saturating_millis};
use crate::clock::Clock;

/// Identity of one negative answer
///
/// Captures every dimension that changes the origin's response: the logical
/// path, the query string and any content-negotiation headers. Two keys are
/// equal only if all components are equal, so distinct resources cannot
/// collide the way a naive string concatenation could.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NegativeCacheKey {
    path: Arc<str>,
    query: Option<Arc<str>>,
    dimensions: BTreeMap<Arc<str>, Arc<str>>,
}

impl NegativeCacheKey {
    /// Key for a bare path
    #[must_use]
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            query: None,
            dimensions: BTreeMap::new(),
        }
    }

    /// Add the (canonical) query string
    #[must_use]
    pub fn with_query(mut self, query: impl Into<Arc<str>>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    /// Add a negotiation dimension such as `accept`
    ///
    /// Dimension names are case-insensitive.
    #[must_use]
    pub fn with_dimension(mut self, name: &str, value: impl Into<Arc<str>>) -> Self {
        self.dimensions
            .insert(name.to_ascii_lowercase().into(), value.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl fmt::Display for NegativeCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{query}")?;
        }
        for (name, value) in &self.dimensions {
            write!(f, " [{name}={value}]")?;
        }
        Ok(())
    }
}

/// Negative outcome to replay while the entry is live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeStatus {
    code: u16,
    message: Option<String>,
}

impl NegativeStatus {
    pub const NOT_FOUND: u16 = 404;
    pub const GONE: u16 = 410;

    #[must_use]
    pub fn new(code: u16, message: Option<String>) -> Self {
        Self { code, message }
    }

    /// Plain 404
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(Self::NOT_FOUND, None)
    }

    /// Whether an origin status code is a cacheable negative answer
    #[must_use]
    pub const fn is_negative_code(code: u16) -> bool {
        matches!(code, Self::NOT_FOUND | Self::GONE)
    }

    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for NegativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} {}", self.code, message),
            None => write!(f, "{}", self.code),
        }
    }
}

#[derive(Debug, Clone)]
struct NegativeEntry {
    status: NegativeStatus,
    recorded_at: u64,
}

/// Point-in-time negative cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegativeCacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// Keyed store of recently confirmed negative answers for one repository
#[derive(Debug)]
pub struct NegativeCacheController {
    entries: DashMap<NegativeCacheKey, NegativeEntry>,
    ttl_millis: AtomicU64,
    enabled: AtomicBool,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl NegativeCacheController {
    /// Create an enabled, unbounded negative cache
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_millis: AtomicU64::new(saturating_millis(ttl)),
            enabled: AtomicBool::new(true),
            max_entries: None,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Bound the number of stored entries
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: Option<usize>) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Start disabled or enabled
    #[must_use]
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::Release);
        self
    }

    /// Remembered negative status for `key`, if present and not expired
    pub fn get(&self, key: &NegativeCacheKey) -> Option<NegativeStatus> {
        if !self.is_enabled() {
            return None;
        }

        let ttl = self.ttl_millis.load(Ordering::Acquire);
        let now = self.clock.now_millis();

        // The shard guard must be released before remove_if below
        match self.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Some(entry) if !is_expired(entry.recorded_at, ttl, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, status = %entry.status, "Negative cache hit");
                return Some(entry.status.clone());
            }
            Some(_) => {}
        }

        // Re-check under the write guard: a concurrent put may have refreshed it
        if self
            .entries
            .remove_if(key, |_, entry| is_expired(entry.recorded_at, ttl, now))
            .is_some()
        {
            self.expired.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Negative cache entry expired");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Record a negative answer stamped with the current time
    ///
    /// Returns `false` when nothing was stored (cache disabled, or full of
    /// live entries).
    pub fn put(&self, key: NegativeCacheKey, status: NegativeStatus) -> bool {
        if !self.is_enabled() {
            return false;
        }

        if let Some(max) = self.max_entries
            && self.entries.len() >= max
            && !self.entries.contains_key(&key)
        {
            self.purge_expired();
            if self.entries.len() >= max {
                debug!(key = %key, max, "Negative cache full, not caching");
                return false;
            }
        }

        debug!(key = %key, status = %status, "Caching negative answer");
        self.entries.insert(
            key,
            NegativeEntry {
                status,
                recorded_at: self.clock.now_millis(),
            },
        );
        true
    }

    /// Remove one entry; returns whether it existed
    pub fn invalidate(&self, key: &NegativeCacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            debug!(key = %key, "Invalidated negative cache entry");
        }
        removed
    }

    /// Remove every entry
    pub fn invalidate_all(&self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Invalidated negative cache");
    }

    /// Drop expired entries now; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl_millis.load(Ordering::Acquire);
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !is_expired(entry.recorded_at, ttl, now));
        let removed = before.saturating_sub(self.entries.len());
        self.expired.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of stored entries, including ones not yet lazily expired
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable; disabling drops every entry
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::AcqRel);
        if was && !enabled {
            self.entries.clear();
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_millis.load(Ordering::Acquire))
    }

    /// Replace the TTL; existing entries are judged against the new value
    pub fn set_ttl(&self, ttl: Duration) {
        self.ttl_millis
            .store(saturating_millis(ttl), Ordering::Release);
    }

    #[must_use]
    pub fn stats(&self) -> NegativeCacheStats {
        NegativeCacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
