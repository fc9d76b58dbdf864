//! Repository configuration
//!
//! Per-repository cache policy, negative cache, and remote health settings,
//! loaded from TOML.

mod defaults;
mod loading;
mod types;
mod validation;

pub use loading::{load_config, parse_config};
pub use types::{HttpClientConfig, NegativeCacheConfig, ProxyPolicy, RepositoryConfig};

// Re-export default functions for use in tests and other modules
pub use defaults::{
    auto_block_initial_window, auto_block_max_window, content_max_age, metadata_max_age,
    negative_cache_ttl,
};
