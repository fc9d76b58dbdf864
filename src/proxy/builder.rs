//! Builder pattern for constructing `ProxyRepository` instances

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use super::ProxyRepository;
use super::traits::{Storage, Transport};
use crate::cache::{CacheControllerHolder, NegativeCacheController};
use crate::clock::{Clock, system_clock};
use crate::config::RepositoryConfig;
use crate::error::ConfigError;
use crate::remote::{RemoteHealthController, RemoteStatus, StatusObserver};

/// Builder for a [`ProxyRepository`]
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use repo_proxy_cache::config::parse_config;
/// use repo_proxy_cache::proxy::{MemoryStorage, ProxyRepositoryBuilder, RemoteRequest,
///     RemoteResponse, Transport};
/// use repo_proxy_cache::error::TransportError;
///
/// #[derive(Debug)]
/// struct Unreachable;
///
/// #[async_trait::async_trait]
/// impl Transport for Unreachable {
///     async fn fetch(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError> {
///         Err(TransportError::Timeout { url: request.url.clone() })
///     }
/// }
///
/// let config = parse_config(r#"
///     name = "central"
///     remote_url = "https://repo.example.com/maven2/"
/// "#).unwrap();
///
/// let repository = ProxyRepositoryBuilder::new(config)
///     .build(Arc::new(MemoryStorage::new()), Arc::new(Unreachable))
///     .unwrap();
/// assert_eq!(repository.name(), "central");
/// ```
pub struct ProxyRepositoryBuilder {
    config: RepositoryConfig,
    clock: Option<Arc<dyn Clock>>,
    observers: Vec<Arc<dyn StatusObserver>>,
}

impl ProxyRepositoryBuilder {
    #[must_use]
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            config,
            clock: None,
            observers: Vec::new(),
        }
    }

    /// Use an explicit time source instead of the system clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register a remote status observer before any call is made
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Validate the configuration and wire up the controllers
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is invalid.
    pub fn build(
        self,
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
    ) -> Result<ProxyRepository, ConfigError> {
        self.config.validate()?;
        let config = self.config;
        let clock = self.clock.unwrap_or_else(system_clock);

        let caches = CacheControllerHolder::from_max_ages(
            config.proxy.content_max_age,
            config.proxy.metadata_max_age,
            Arc::clone(&clock),
        );

        let negative_cache = Arc::new(
            NegativeCacheController::new(config.negative_cache.ttl(), Arc::clone(&clock))
                .with_max_entries(config.negative_cache.max_entries)
                .with_enabled(config.negative_cache.enabled),
        );

        let health = RemoteHealthController::with_clock(
            config.name.as_str(),
            &config.health_settings(),
            clock,
        );
        health.add_observer(Arc::new(PurgeOnUnblock(Arc::clone(&negative_cache))));
        for observer in self.observers {
            health.add_observer(observer);
        }

        info!(
            repository = %config.name,
            remote = %config.remote_url,
            content_max_age = %config.proxy.content_max_age,
            metadata_max_age = %config.proxy.metadata_max_age,
            negative_cache = config.negative_cache.enabled,
            status = %health.status(),
            "Proxy repository ready"
        );

        Ok(ProxyRepository {
            config: RwLock::new(Arc::new(config)),
            caches,
            negative_cache,
            health,
            storage,
            transport,
        })
    }
}

/// Drops remembered negative answers when a manual block or offline state is lifted
///
/// Those answers may predate the block and the remote may have changed since.
struct PurgeOnUnblock(Arc<NegativeCacheController>);

impl StatusObserver for PurgeOnUnblock {
    fn on_status_changed(&self, old: &RemoteStatus, new: &RemoteStatus) {
        if old.kind().is_manual() && !new.kind().is_manual() {
            debug!(from = %old.kind(), "Remote unblocked, purging negative cache");
            self.0.invalidate_all();
        }
    }
}
