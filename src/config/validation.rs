//! Configuration validation
//!
//! Rejects settings that would make the cache policy ambiguous before any
//! controller is built from them.

use super::types::RepositoryConfig;
use crate::error::ConfigError;

impl RepositoryConfig {
    /// Validate configuration for correctness
    ///
    /// The repository name is validated by its type. This checks:
    /// - the remote URL is an absolute http(s) URL with a host
    /// - the negative cache TTL is not negative
    /// - auto-block windows are non-zero and ordered
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_remote_url(&self.remote_url)?;

        if self.negative_cache.time_to_live < 0 {
            return Err(ConfigError::NegativeCacheTtl(
                self.negative_cache.time_to_live,
            ));
        }

        let http = &self.http_client;
        if http.auto_block_initial_window.is_zero() || http.auto_block_max_window.is_zero() {
            return Err(ConfigError::ZeroAutoBlockWindow);
        }
        if http.auto_block_max_window < http.auto_block_initial_window {
            return Err(ConfigError::AutoBlockWindowOrder {
                initial: http.auto_block_initial_window.as_secs(),
                max: http.auto_block_max_window.as_secs(),
            });
        }

        if self.negative_cache.max_entries == Some(0) {
            tracing::warn!(
                "Repository '{}' has negative_cache.max_entries = 0; not-found answers will never be cached",
                self.name
            );
        }

        Ok(())
    }
}

fn validate_remote_url(url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidRemoteUrl {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| invalid("scheme must be http or https"))?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    Ok(())
}
