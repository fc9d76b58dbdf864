//! Per resource-class staleness policy
//!
//! A snapshot is stale iff its generation token differs from the controller's
//! current generation, or age expiry is enabled and the snapshot has reached
//! its max age (see [`super::ttl`] for the boundary convention).
//!
//! Both the max age and the generation are single atomics: `is_stale` and
//! `current` never block, and `invalidate` never waits for readers. A check
//! racing an invalidation may observe either token, which at worst serves the
//! old content for one more check.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

use super::snapshot::{CacheSnapshot, GenerationToken};
use super::ttl::MaxAge;
use crate::clock::{Clock, system_clock};

/// Sentinel stored in the max-age atomic for [`MaxAge::Never`]
const NEVER_EXPIRES: i64 = -1;

/// Seed for new generation tokens: nanoseconds since the Unix epoch
fn token_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

fn encode_max_age(max_age: MaxAge) -> i64 {
    max_age
        .as_millis()
        .map_or(NEVER_EXPIRES, |ms| ms.min(i64::MAX as u64) as i64)
}

fn decode_max_age(raw: i64) -> MaxAge {
    if raw < 0 {
        MaxAge::Never
    } else {
        MaxAge::After(Duration::from_millis(raw as u64))
    }
}

/// Decides whether cached snapshots of one resource class are stale
#[derive(Debug)]
pub struct CacheController {
    /// Max age in millis, [`NEVER_EXPIRES`] to disable age checks
    max_age_millis: AtomicI64,
    /// Current generation token
    generation: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl CacheController {
    /// Create a controller with a fresh generation, using the system clock
    #[must_use]
    pub fn new(max_age: MaxAge) -> Self {
        Self::with_clock(max_age, system_clock())
    }

    /// Create a controller with a fresh generation and an explicit clock
    ///
    /// Snapshots persisted under an earlier generation (e.g. before a restart)
    /// are stale under the new controller.
    #[must_use]
    pub fn with_clock(max_age: MaxAge, clock: Arc<dyn Clock>) -> Self {
        Self::with_generation(max_age, GenerationToken::new(token_seed()), clock)
    }

    /// Create a controller that resumes a known generation
    #[must_use]
    pub fn with_generation(
        max_age: MaxAge,
        generation: GenerationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            max_age_millis: AtomicI64::new(encode_max_age(max_age)),
            generation: AtomicU64::new(generation.get()),
            clock,
        }
    }

    /// Snapshot stamped with the current time and generation
    #[must_use]
    pub fn current(&self) -> CacheSnapshot {
        CacheSnapshot::new(self.clock.now_millis(), Some(self.generation()))
    }

    /// Whether `snapshot` must be re-verified against the origin
    #[must_use]
    pub fn is_stale(&self, snapshot: &CacheSnapshot) -> bool {
        if snapshot.token() != Some(self.generation()) {
            return true;
        }
        self.max_age()
            .is_exceeded(snapshot.last_verified(), self.clock.now_millis())
    }

    /// Start a new generation; every earlier snapshot becomes stale
    ///
    /// Returns the new token. Tokens strictly increase per controller even if
    /// the wall clock stalls or steps backwards.
    pub fn invalidate(&self) -> GenerationToken {
        let mut next = 0;
        let previous = self
            .generation
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                next = token_seed().max(prev.wrapping_add(1));
                Some(next)
            })
            .unwrap_or_else(|prev| prev);
        debug!(
            previous = %GenerationToken::new(previous),
            current = %GenerationToken::new(next),
            "Cache generation invalidated"
        );
        GenerationToken::new(next)
    }

    /// Current generation token
    #[must_use]
    #[inline]
    pub fn generation(&self) -> GenerationToken {
        GenerationToken::new(self.generation.load(Ordering::Acquire))
    }

    /// Configured max age
    #[must_use]
    #[inline]
    pub fn max_age(&self) -> MaxAge {
        decode_max_age(self.max_age_millis.load(Ordering::Acquire))
    }

    /// Replace the max age without touching the generation
    pub fn set_max_age(&self, max_age: MaxAge) {
        self.max_age_millis
            .store(encode_max_age(max_age), Ordering::Release);
    }
}
