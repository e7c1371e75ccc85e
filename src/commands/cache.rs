use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use partscout::cache::FileCache;
use partscout::config::{CacheBackend, Config};

pub async fn cache_clear(expired_only: bool, config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    let guards = &config.guards;

    if guards.cache_backend == CacheBackend::Redis {
        println!("Redis entries expire on their own; nothing to clear locally.");
        return Ok(());
    }

    let cache = FileCache::open(&guards.cache_dir, Duration::from_secs(guards.cache_ttl_secs))
        .await
        .with_context(|| format!("Failed to open cache at {}", guards.cache_dir.display()))?;

    let cleared = if expired_only {
        cache.clear_expired().await?
    } else {
        cache.clear_all().await?
    };

    let kind = if expired_only { "expired " } else { "" };
    println!("Removed {cleared} {kind}cache entries from {}", cache.dir().display());
    Ok(())
}
