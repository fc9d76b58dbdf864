//! Tests for config loading from TOML files

use anyhow::Result;
use repo_proxy_cache::cache::MaxAge;
use repo_proxy_cache::config::{load_config, parse_config};
use repo_proxy_cache::error::ConfigError;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_load_full_config() -> Result<()> {
    let file = write_config(
        r#"
name = "maven-central"
remote_url = "https://repo1.maven.org/maven2/"
online = true

[proxy]
content_max_age = -1
metadata_max_age = 1800

[negative_cache]
enabled = true
time_to_live = 1440
max_entries = 5000

[http_client]
blocked = false
auto_block = true
auto_block_initial_window = 20
auto_block_max_window = 600
"#,
    )?;

    let config = load_config(file.path())?;
    assert_eq!(config.name.as_str(), "maven-central");
    assert_eq!(config.proxy.content_max_age, MaxAge::Never);
    assert_eq!(config.proxy.metadata_max_age, MaxAge::from_secs(1800));
    assert_eq!(config.negative_cache.ttl(), Duration::from_secs(1440));
    assert_eq!(config.negative_cache.max_entries, Some(5000));
    assert_eq!(
        config.http_client.auto_block_initial_window,
        Duration::from_secs(20)
    );
    assert_eq!(
        config.http_client.auto_block_max_window,
        Duration::from_secs(600)
    );
    Ok(())
}

#[test]
fn test_minimal_config_uses_defaults() -> Result<()> {
    let config = parse_config(
        r#"
name = "npm"
remote_url = "https://registry.npmjs.org"
"#,
    )?;
    assert!(config.online);
    assert_eq!(config.proxy.content_max_age, MaxAge::from_secs(86_400));
    assert!(config.negative_cache.enabled);
    assert!(config.http_client.auto_block);
    Ok(())
}

#[test]
fn test_missing_file_mentions_path() {
    let err = load_config("/nonexistent/repository.toml").unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/repository.toml"));
}

#[test]
fn test_invalid_toml_returns_error() -> Result<()> {
    let file = write_config("name = [unclosed")?;
    assert!(load_config(file.path()).is_err());
    Ok(())
}

#[test]
fn test_negative_ttl_is_rejected() -> Result<()> {
    let file = write_config(
        r#"
name = "central"
remote_url = "https://repo.example.com/"

[negative_cache]
time_to_live = -10
"#,
    )?;
    let err = load_config(file.path()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::NegativeCacheTtl(-10))
    );
    Ok(())
}

#[test]
fn test_empty_name_is_rejected() {
    let result = parse_config(
        r#"
name = "  "
remote_url = "https://repo.example.com/"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_inverted_auto_block_windows_are_rejected() {
    let result = parse_config(
        r#"
name = "central"
remote_url = "https://repo.example.com/"

[http_client]
auto_block_initial_window = 600
auto_block_max_window = 60
"#,
    );
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::AutoBlockWindowOrder { .. })
    ));
}

#[test]
fn test_config_serializes_back_to_toml() -> Result<()> {
    let config = parse_config(
        r#"
name = "central"
remote_url = "https://repo.example.com/"
"#,
    )?;
    let rendered = toml::to_string(&config)?;
    assert_eq!(parse_config(&rendered)?, config);
    Ok(())
}
