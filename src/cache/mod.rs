//! Cache freshness for proxied content
//!
//! - [`ttl`]: max-age policy and the shared expiry boundary
//! - [`snapshot`]: per-asset freshness records stored in asset attributes
//! - [`controller`]: staleness decisions and invalidation for one resource class
//! - [`holder`]: one controller per resource class of a repository
//! - [`negative`]: remembered "not found" answers

pub mod controller;
pub mod holder;
pub mod negative;
pub mod snapshot;
pub mod ttl;

pub use controller::CacheController;
pub use holder::{CacheControllerHolder, CacheType};
pub use negative::{NegativeCacheController, NegativeCacheKey, NegativeCacheStats, NegativeStatus};
pub use snapshot::{AttributeBag, CacheSnapshot, GenerationToken};
pub use ttl::MaxAge;
