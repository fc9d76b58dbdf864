//! Proxy repository request pipeline
//!
//! [`ProxyRepository`] ties the cache controllers, the negative cache and the
//! remote health controller together around pluggable storage and transport.
//!
//! A GET is answered from the first source that can:
//! 1. a live negative cache entry (no I/O)
//! 2. stored content whose snapshot is still fresh
//! 3. the remote origin, gated by remote health
//! 4. stale stored content, when the remote cannot be used or no longer
//!    has the asset
//!
//! ## Module structure
//!
//! - [`builder`]: validated construction
//! - [`request`]: inbound and outbound request types
//! - [`traits`]: storage and transport collaborator contracts
//! - [`memory`]: in-memory storage

mod builder;
mod memory;
mod request;
mod traits;

pub use builder::ProxyRepositoryBuilder;
pub use memory::MemoryStorage;
pub use request::{
    ETAG_HEADER, Headers, IF_MODIFIED_SINCE_HEADER, IF_NONE_MATCH_HEADER, LAST_MODIFIED_HEADER,
    Method, NEGOTIATION_HEADERS, ProxyRequest, RemoteRequest, RemoteResponse,
};
pub use traits::{Storage, StoredItem, Transport};

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info, trace};

use crate::cache::{
    AttributeBag, CacheController, CacheControllerHolder, CacheSnapshot, NegativeCacheController,
    NegativeCacheKey, NegativeStatus,
};
use crate::config::RepositoryConfig;
use crate::error::{ConfigError, ProxyError};
use crate::remote::RemoteHealthController;

/// Attribute holding the origin's ETag of the stored content
pub const ETAG_ATTRIBUTE: &str = "remote_etag";

/// Attribute holding the origin's Last-Modified of the stored content
pub const LAST_MODIFIED_ATTRIBUTE: &str = "remote_last_modified";

/// How a GET was answered
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The resource does not exist; `cached` when answered from the negative cache
    NotFound { status: NegativeStatus, cached: bool },
    /// Fresh stored content, no remote call
    Cached(StoredItem),
    /// Content fetched from the remote and stored
    Fetched(StoredItem),
    /// Remote confirmed the stored content is unchanged
    Revalidated(StoredItem),
    /// Remote unusable; stale stored content served instead
    Stale(StoredItem),
}

impl Outcome {
    /// Content bytes, if the resource was found
    #[must_use]
    pub fn content(&self) -> Option<&[u8]> {
        self.item().map(|item| item.content.as_slice())
    }

    #[must_use]
    pub fn item(&self) -> Option<&StoredItem> {
        match self {
            Self::NotFound { .. } => None,
            Self::Cached(item) | Self::Fetched(item) | Self::Revalidated(item) | Self::Stale(item) => {
                Some(item)
            }
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short label for logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Cached(_) => "cached",
            Self::Fetched(_) => "fetched",
            Self::Revalidated(_) => "revalidated",
            Self::Stale(_) => "stale",
        }
    }
}

/// One proxy repository: caches in front of one remote origin
pub struct ProxyRepository {
    config: RwLock<Arc<RepositoryConfig>>,
    caches: CacheControllerHolder,
    negative_cache: Arc<NegativeCacheController>,
    health: RemoteHealthController,
    storage: Arc<dyn Storage>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for ProxyRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRepository")
            .field("config", &self.config())
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl ProxyRepository {
    /// Current configuration
    #[must_use]
    pub fn config(&self) -> Arc<RepositoryConfig> {
        Arc::clone(&self.config.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.health.name()
    }

    #[must_use]
    pub fn caches(&self) -> &CacheControllerHolder {
        &self.caches
    }

    #[must_use]
    pub fn negative_cache(&self) -> &NegativeCacheController {
        &self.negative_cache
    }

    #[must_use]
    pub fn health(&self) -> &RemoteHealthController {
        &self.health
    }

    /// Answer a GET from cache or the remote
    ///
    /// Remote failures are not errors while stored content exists: the stale
    /// content is served instead. That includes a 404 or 410 for an asset
    /// already stored, which is not remembered as missing.
    ///
    /// # Errors
    ///
    /// - [`ProxyError::NotCacheable`] for non-GET requests
    /// - [`ProxyError::Remote`] or [`ProxyError::UnexpectedStatus`] when the
    ///   remote could not answer and nothing is stored
    /// - [`ProxyError::Storage`] when storage fails
    pub async fn get(&self, request: &ProxyRequest) -> Result<Outcome, ProxyError> {
        if request.method() != Method::Get {
            return Err(ProxyError::NotCacheable(request.method().to_string()));
        }

        let key = request.negative_key();
        if let Some(status) = self.negative_cache.get(&key) {
            trace!(repository = %self.name(), key = %key, "Negative cache hit");
            return Ok(Outcome::NotFound {
                status,
                cached: true,
            });
        }

        let storage_key = request.storage_key();
        let controller = self.caches.get(request.cache_type());
        let stored = match self.storage.get(&storage_key).await? {
            Some(item) if is_fresh(controller, &item) => {
                trace!(repository = %self.name(), path = %storage_key, "Serving fresh cached content");
                return Ok(Outcome::Cached(item));
            }
            other => other,
        };

        let config = self.config();
        let mut remote = request.to_remote(&config.remote_url);
        if let Some(item) = &stored {
            add_conditional_headers(&mut remote, &item.attributes);
        }

        let result = self
            .health
            .filter_request(&remote.url, || self.transport.fetch(&remote))
            .await;

        match result {
            Ok(response) => {
                self.handle_response(&key, &storage_key, controller, stored, response)
                    .await
            }
            Err(err) => self.serve_stale(&storage_key, stored, ProxyError::Remote(err)),
        }
    }

    async fn handle_response(
        &self,
        key: &NegativeCacheKey,
        storage_key: &str,
        controller: &CacheController,
        stored: Option<StoredItem>,
        response: RemoteResponse,
    ) -> Result<Outcome, ProxyError> {
        let status = response.status();

        // Only a full 200 body is the asset; other 2xx fall through to stale
        if status == 200 {
            let mut attributes = stored.map(|item| item.attributes).unwrap_or_default();
            record_validators(&mut attributes, &response);
            controller.current().apply_to(&mut attributes);
            let item = StoredItem {
                content: response.into_body(),
                attributes,
            };
            self.storage.put(storage_key, item.clone()).await?;
            self.negative_cache.invalidate(key);
            debug!(repository = %self.name(), path = %storage_key, bytes = item.content.len(), "Fetched from remote");
            return Ok(Outcome::Fetched(item));
        }

        if status == 304 {
            // Conditional headers are only sent when something is stored
            let Some(mut item) = stored else {
                return Err(ProxyError::UnexpectedStatus {
                    code: status,
                    path: storage_key.to_owned(),
                });
            };
            controller.current().apply_to(&mut item.attributes);
            self.storage
                .write_attributes(storage_key, item.attributes.clone())
                .await?;
            debug!(repository = %self.name(), path = %storage_key, "Remote content unchanged, marked verified");
            return Ok(Outcome::Revalidated(item));
        }

        if NegativeStatus::is_negative_code(status) && stored.is_none() {
            let negative = NegativeStatus::new(status, None);
            if self.health.status().kind().is_manual() {
                debug!(repository = %self.name(), key = %key, "Remote blocked, not caching negative answer");
            } else {
                self.negative_cache.put(key.clone(), negative.clone());
            }
            return Ok(Outcome::NotFound {
                status: negative,
                cached: false,
            });
        }

        self.serve_stale(
            storage_key,
            stored,
            ProxyError::UnexpectedStatus {
                code: status,
                path: storage_key.to_owned(),
            },
        )
    }

    fn serve_stale(
        &self,
        storage_key: &str,
        stored: Option<StoredItem>,
        err: ProxyError,
    ) -> Result<Outcome, ProxyError> {
        match stored {
            Some(item) => {
                debug!(
                    repository = %self.name(),
                    path = %storage_key,
                    error = %err,
                    "Remote unusable, serving stale content"
                );
                Ok(Outcome::Stale(item))
            }
            None => Err(err),
        }
    }

    /// Send a request straight to the remote through the health gate
    ///
    /// Nothing is read from or written to the caches.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Remote`] if the call was refused or failed.
    pub async fn passthrough(&self, request: &ProxyRequest) -> Result<RemoteResponse, ProxyError> {
        let config = self.config();
        let remote = request.to_remote_verbatim(&config.remote_url);
        let response = self
            .health
            .filter_request(&remote.url, || self.transport.fetch(&remote))
            .await?;
        Ok(response)
    }

    /// Make every cached asset and negative answer of this repository stale
    pub fn invalidate_caches(&self) {
        self.caches.invalidate_all();
        self.negative_cache.invalidate_all();
        info!(repository = %self.name(), "Invalidated repository caches");
    }

    /// Apply a refreshed configuration
    ///
    /// Max ages change without starting a new generation. A different remote
    /// URL purges the negative cache, since its answers came from the old
    /// remote. Manual block and offline flags are re-read.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] and changes nothing if `config` is invalid.
    pub fn reconfigure(&self, config: RepositoryConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let previous = self.config();

        self.caches
            .content()
            .set_max_age(config.proxy.content_max_age);
        self.caches
            .metadata()
            .set_max_age(config.proxy.metadata_max_age);

        self.negative_cache.set_ttl(config.negative_cache.ttl());
        self.negative_cache.set_enabled(config.negative_cache.enabled);
        if previous.remote_url != config.remote_url {
            info!(
                repository = %self.name(),
                from = %previous.remote_url,
                to = %config.remote_url,
                "Remote URL changed, purging negative cache"
            );
            self.negative_cache.invalidate_all();
        }

        self.health.apply_settings(&config.health_settings());

        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        Ok(())
    }
}

fn is_fresh(controller: &CacheController, item: &StoredItem) -> bool {
    CacheSnapshot::extract_from(&item.attributes)
        .is_some_and(|snapshot| !controller.is_stale(&snapshot))
}

fn record_validators(attributes: &mut AttributeBag, response: &RemoteResponse) {
    for (header, attribute) in [
        (ETAG_HEADER, ETAG_ATTRIBUTE),
        (LAST_MODIFIED_HEADER, LAST_MODIFIED_ATTRIBUTE),
    ] {
        match response.header(header) {
            Some(value) => {
                attributes.insert(attribute.to_owned(), Value::from(value));
            }
            None => {
                attributes.remove(attribute);
            }
        }
    }
}

fn add_conditional_headers(remote: &mut RemoteRequest, attributes: &AttributeBag) {
    if let Some(etag) = attributes.get(ETAG_ATTRIBUTE).and_then(Value::as_str) {
        remote.headers.insert(IF_NONE_MATCH_HEADER, etag);
    }
    if let Some(modified) = attributes.get(LAST_MODIFIED_ATTRIBUTE).and_then(Value::as_str) {
        remote.headers.insert(IF_MODIFIED_SINCE_HEADER, modified);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validators_follow_response() {
        let mut attributes = AttributeBag::new();
        attributes.insert(LAST_MODIFIED_ATTRIBUTE.to_owned(), json!("old"));

        let response = RemoteResponse::ok("x").with_header("ETag", "\"v2\"");
        record_validators(&mut attributes, &response);

        assert_eq!(attributes[ETAG_ATTRIBUTE], json!("\"v2\""));
        assert!(!attributes.contains_key(LAST_MODIFIED_ATTRIBUTE));
    }

    #[test]
    fn conditional_headers_from_attributes() {
        let mut attributes = AttributeBag::new();
        attributes.insert(ETAG_ATTRIBUTE.to_owned(), json!("\"v1\""));
        attributes.insert(
            LAST_MODIFIED_ATTRIBUTE.to_owned(),
            json!("Tue, 01 Oct 2024 10:00:00 GMT"),
        );

        let path = "/a".parse().unwrap();
        let mut remote = ProxyRequest::get(path).to_remote("https://repo.example.com");
        add_conditional_headers(&mut remote, &attributes);

        assert_eq!(remote.headers.get("If-None-Match"), Some("\"v1\""));
        assert_eq!(
            remote.headers.get("if-modified-since"),
            Some("Tue, 01 Oct 2024 10:00:00 GMT")
        );
    }

    #[test]
    fn outcome_accessors() {
        let found = Outcome::Cached(StoredItem::new("bytes"));
        assert_eq!(found.content(), Some(&b"bytes"[..]));
        assert_eq!(found.as_str(), "cached");

        let missing = Outcome::NotFound {
            status: NegativeStatus::not_found(),
            cached: true,
        };
        assert!(missing.is_not_found());
        assert!(missing.content().is_none());
    }
}
