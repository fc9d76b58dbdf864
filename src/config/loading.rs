//! Configuration loading from TOML files

use std::path::Path;

use anyhow::{Context, Result};

use super::types::RepositoryConfig;

/// Parse and validate a repository configuration from TOML text
pub fn parse_config(content: &str) -> Result<RepositoryConfig> {
    let config: RepositoryConfig =
        toml::from_str(content).context("Failed to parse repository config")?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a repository configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<RepositoryConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let config = parse_config(&content)
        .with_context(|| format!("Invalid config file '{}'", path.display()))?;

    tracing::debug!(
        repository = %config.name,
        remote = %config.remote_url,
        "Loaded repository config"
    );
    Ok(config)
}
