//! Command-line arguments for the config check binary

use std::path::PathBuf;

use clap::Parser;

/// Validate a proxy repository configuration and print its effective policy
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CheckArgs {
    /// Repository configuration file
    #[arg(short, long, default_value = "repository.toml", env = "PROXY_CACHE_CONFIG")]
    pub config: PathBuf,

    /// Print the effective configuration as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Number of upcoming auto-block windows to show
    #[arg(long, default_value_t = 6, env = "PROXY_CACHE_WINDOWS")]
    pub windows: usize,

    /// Also write logs to this file
    #[arg(long, env = "PROXY_CACHE_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CheckArgs::try_parse_from(["proxy-cache-check"]).unwrap();
        assert_eq!(args.config, PathBuf::from("repository.toml"));
        assert!(!args.json);
        assert_eq!(args.windows, 6);
        assert!(args.log_file.is_none());
    }

    #[test]
    fn explicit_values() {
        let args = CheckArgs::try_parse_from([
            "proxy-cache-check",
            "-c",
            "/etc/proxy/central.toml",
            "--json",
            "--windows",
            "3",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/proxy/central.toml"));
        assert!(args.json);
        assert_eq!(args.windows, 3);
    }
}
