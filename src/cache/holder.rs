//! Cache controllers of one repository, keyed by resource class

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::controller::CacheController;
use super::ttl::MaxAge;
use crate::clock::Clock;

/// Class of cached resource; each class has its own max age and generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Immutable-ish artifacts (jars, tarballs, wheels)
    Content,
    /// Indexes and listings that change as the origin publishes
    Metadata,
}

impl CacheType {
    /// Every declared class, in a stable order
    pub const ALL: [Self; 2] = [Self::Content, Self::Metadata];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Metadata => "metadata",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Content => 0,
            Self::Metadata => 1,
        }
    }
}

impl fmt::Display for CacheType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "content" => Ok(Self::Content),
            "metadata" => Ok(Self::Metadata),
            other => Err(format!("unknown cache type: {other}")),
        }
    }
}

/// Binds every [`CacheType`] of one repository to exactly one controller
///
/// The controllers are fixed at construction so there is never a class
/// without a controller.
#[derive(Debug, Clone)]
pub struct CacheControllerHolder {
    controllers: [Arc<CacheController>; 2],
}

impl CacheControllerHolder {
    /// Build from one controller per class
    #[must_use]
    pub fn new(content: CacheController, metadata: CacheController) -> Self {
        Self {
            controllers: [Arc::new(content), Arc::new(metadata)],
        }
    }

    /// Build fresh controllers for the given max ages
    #[must_use]
    pub fn from_max_ages(content: MaxAge, metadata: MaxAge, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            CacheController::with_clock(content, Arc::clone(&clock)),
            CacheController::with_clock(metadata, clock),
        )
    }

    /// Controller for a resource class
    #[must_use]
    #[inline]
    pub fn get(&self, cache_type: CacheType) -> &Arc<CacheController> {
        &self.controllers[cache_type.index()]
    }

    /// Controller for a class given by name, `None` for undeclared names
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<CacheController>> {
        name.parse::<CacheType>().ok().map(|t| self.get(t))
    }

    #[must_use]
    pub fn content(&self) -> &Arc<CacheController> {
        self.get(CacheType::Content)
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<CacheController> {
        self.get(CacheType::Metadata)
    }

    /// Invalidate every registered controller
    pub fn invalidate_all(&self) {
        for cache_type in CacheType::ALL {
            let token = self.get(cache_type).invalidate();
            info!(cache_type = %cache_type, generation = %token, "Invalidated cache");
        }
    }

    /// Iterate `(class, controller)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (CacheType, &Arc<CacheController>)> + '_ {
        CacheType::ALL.into_iter().map(move |t| (t, self.get(t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn holder() -> CacheControllerHolder {
        let clock = ManualClock::new(0);
        CacheControllerHolder::from_max_ages(
            MaxAge::from_secs(3600),
            MaxAge::from_secs(60),
            clock.handle(),
        )
    }

    #[test]
    fn every_class_has_a_controller() {
        let holder = holder();
        assert_eq!(holder.iter().count(), CacheType::ALL.len());
        assert_eq!(holder.content().max_age(), MaxAge::from_secs(3600));
        assert_eq!(holder.metadata().max_age(), MaxAge::from_secs(60));
    }

    #[test]
    fn get_by_name() {
        let holder = holder();
        assert!(holder.get_by_name("content").is_some());
        assert!(holder.get_by_name("METADATA").is_some());
        assert!(holder.get_by_name("blobs").is_none());
    }

    #[test]
    fn invalidate_all_touches_every_controller() {
        let holder = holder();
        let content = holder.content().current();
        let metadata = holder.metadata().current();

        holder.invalidate_all();

        assert!(holder.content().is_stale(&content));
        assert!(holder.metadata().is_stale(&metadata));
    }

    #[test]
    fn controllers_are_independent() {
        let holder = holder();
        let content = holder.content().current();

        holder.metadata().invalidate();
        assert!(!holder.content().is_stale(&content));
    }

    #[test]
    fn clones_share_controllers() {
        let holder = holder();
        let clone = holder.clone();
        let snapshot = holder.content().current();

        clone.invalidate_all();
        assert!(holder.content().is_stale(&snapshot));
    }

    #[test]
    fn cache_type_parse_and_display() {
        assert_eq!("Content".parse::<CacheType>(), Ok(CacheType::Content));
        assert!("nope".parse::<CacheType>().is_err());
        assert_eq!(CacheType::Metadata.to_string(), "metadata");
    }
}
