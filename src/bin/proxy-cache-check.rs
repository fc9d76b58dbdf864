use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use repo_proxy_cache::args::CheckArgs;
use repo_proxy_cache::config::load_config;
use repo_proxy_cache::logging::init_logging;
use repo_proxy_cache::remote::{AutoBlockSchedule, RemoteHealthController};

fn main() -> Result<()> {
    let args = CheckArgs::parse();
    let _guard = init_logging(args.log_file.as_deref());

    let config = load_config(&args.config)?;
    info!(repository = %config.name, "Configuration is valid");

    if args.json {
        let json = serde_json::to_string_pretty(&config).context("Failed to render config")?;
        println!("{json}");
        return Ok(());
    }

    let health = RemoteHealthController::new(config.name.as_str(), &config.health_settings());
    let http = &config.http_client;

    println!("repository:        {}", config.name);
    println!("remote:            {}", config.remote_url);
    println!("initial status:    {}", health.status());
    println!("content max age:   {}", config.proxy.content_max_age);
    println!("metadata max age:  {}", config.proxy.metadata_max_age);
    if config.negative_cache.enabled {
        let bound = config
            .negative_cache
            .max_entries
            .map_or_else(|| "unbounded".to_owned(), |n| format!("max {n} entries"));
        println!(
            "negative cache:    {}s ({bound})",
            config.negative_cache.ttl().as_secs()
        );
    } else {
        println!("negative cache:    disabled");
    }

    if http.auto_block {
        let mut schedule =
            AutoBlockSchedule::new(http.auto_block_initial_window, http.auto_block_max_window);
        let windows: Vec<String> = (0..args.windows)
            .map(|_| format!("{}s", schedule.next_window().as_secs()))
            .collect();
        println!("auto-block:        {}", windows.join(", "));
    } else {
        println!("auto-block:        disabled");
    }

    Ok(())
}
