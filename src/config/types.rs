//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::ttl::MaxAge;
use crate::remote::RemoteHealthSettings;
use crate::types::{RepositoryName, duration_serde};

/// Configuration of one proxy repository
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    /// Repository identifier, used in logs
    pub name: RepositoryName,
    /// Base URL of the remote origin
    pub remote_url: String,
    /// `false` takes the remote offline
    #[serde(default = "super::defaults::online")]
    pub online: bool,
    #[serde(default)]
    pub proxy: ProxyPolicy,
    #[serde(default)]
    pub negative_cache: NegativeCacheConfig,
    #[serde(default)]
    pub http_client: HttpClientConfig,
}

impl RepositoryConfig {
    /// Configuration with every optional setting at its default
    #[must_use]
    pub fn new(name: RepositoryName, remote_url: impl Into<String>) -> Self {
        Self {
            name,
            remote_url: remote_url.into(),
            online: super::defaults::online(),
            proxy: ProxyPolicy::default(),
            negative_cache: NegativeCacheConfig::default(),
            http_client: HttpClientConfig::default(),
        }
    }

    /// Health policy for the remote health controller
    #[must_use]
    pub fn health_settings(&self) -> RemoteHealthSettings {
        RemoteHealthSettings {
            blocked: self.http_client.blocked,
            offline: !self.online,
            auto_block: self.http_client.auto_block,
            auto_block_initial_window: self.http_client.auto_block_initial_window,
            auto_block_max_window: self.http_client.auto_block_max_window,
        }
    }
}

/// Staleness policy per resource class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyPolicy {
    /// Seconds; -1 never expires by age
    pub content_max_age: MaxAge,
    /// Seconds; -1 never expires by age
    pub metadata_max_age: MaxAge,
}

impl Default for ProxyPolicy {
    fn default() -> Self {
        Self {
            content_max_age: super::defaults::content_max_age(),
            metadata_max_age: super::defaults::metadata_max_age(),
        }
    }
}

/// Negative (not-found) cache settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NegativeCacheConfig {
    pub enabled: bool,
    /// Seconds a not-found answer is remembered; must not be negative
    pub time_to_live: i64,
    /// Upper bound on remembered answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl NegativeCacheConfig {
    /// TTL as a duration; negative values (rejected by validation) clamp to zero
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.time_to_live).unwrap_or(0))
    }
}

impl Default for NegativeCacheConfig {
    fn default() -> Self {
        Self {
            enabled: super::defaults::negative_cache_enabled(),
            time_to_live: super::defaults::negative_cache_ttl(),
            max_entries: None,
        }
    }
}

/// Remote connection health settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Manual block
    pub blocked: bool,
    pub auto_block: bool,
    #[serde(with = "duration_serde")]
    pub auto_block_initial_window: Duration,
    #[serde(with = "duration_serde")]
    pub auto_block_max_window: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            blocked: false,
            auto_block: super::defaults::auto_block(),
            auto_block_initial_window: super::defaults::auto_block_initial_window(),
            auto_block_max_window: super::defaults::auto_block_max_window(),
        }
    }
}
