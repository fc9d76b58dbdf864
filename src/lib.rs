//! Cache freshness, negative caching and remote health gating for
//! artifact-repository proxies.
//!
//! A proxy repository answers requests for artifacts from a local cache and
//! fetches from a remote origin only when needed:
//!
//! - [`CacheController`] decides when a stored asset must be re-verified, by
//!   age or by an explicit invalidation that starts a new generation
//! - [`NegativeCacheController`] remembers recent "not found" answers
//! - [`RemoteHealthController`] gates outbound calls behind a circuit breaker
//!   that blocks an unreachable origin for a growing window
//! - [`ProxyRepository`] combines them around pluggable storage and transport
//!
//! All expiry is evaluated lazily against an injectable [`Clock`]; nothing
//! here runs in the background.

pub mod args;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod remote;
pub mod types;

pub use cache::{
    CacheController, CacheControllerHolder, CacheSnapshot, CacheType, GenerationToken, MaxAge,
    NegativeCacheController, NegativeCacheKey, NegativeStatus,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RepositoryConfig, load_config};
pub use error::{ConfigError, ProxyError, RemoteError, TransportError};
pub use proxy::{Outcome, ProxyRepository, ProxyRepositoryBuilder, ProxyRequest};
pub use remote::{RemoteHealthController, RemoteStatus, RemoteStatusKind, StatusObserver};
