//! Offer caching in front of supplier adapters
//!
//! Three backends share the [`OfferCache`] trait:
//! - [`FileCache`]: one JSON file per key under a directory, with a TTL
//! - [`RedisCache`]: shared cache for multi-instance deployments
//! - [`NoCache`]: always misses
//!
//! Cache failures never fail a search; the guard layer logs and moves on.
//!
//! # Example
//!
//! ```rust,ignore
//! use partscout::cache::{FileCache, OfferCache};
//!
//! let cache = FileCache::open("/tmp/partscout_cache", Duration::from_secs(3600)).await?;
//! cache.set("berg:OC90:", &offers).await?;
//! let cached = cache.get("berg:OC90:").await?;
//! ```

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheBackend, GuardsConfig};
use crate::error::{Error, Result};
use crate::models::Offer;

/// Storage for supplier results keyed by `provider:ARTICLE:BRAND`
#[async_trait]
pub trait OfferCache: Send + Sync {
    /// Fetch a live entry
    async fn get(&self, key: &str) -> Result<Option<Vec<Offer>>>;

    /// Store offers under a key
    async fn set(&self, key: &str, offers: &[Offer]) -> Result<()>;

    /// Backend name for logs
    fn backend(&self) -> &'static str;

    /// Whether lookups can ever hit
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Cached entry as stored by every backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedOffers {
    pub key: String,
    /// Unix timestamp (seconds) when the entry was written
    pub cached_at: i64,
    pub offers: Vec<Offer>,
}

impl CachedOffers {
    fn new(key: &str, offers: &[Offer]) -> Self {
        Self {
            key: key.to_string(),
            cached_at: chrono::Utc::now().timestamp(),
            offers: offers.to_vec(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        let age = chrono::Utc::now().timestamp() - self.cached_at;
        age < 0 || age as u64 > ttl.as_secs()
    }
}

/// Hash a cache key for use as a file name or Redis key suffix
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// File cache
// ============================================================================

/// JSON-file cache with a TTL
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    /// Open a cache directory, creating it if needed
    pub async fn open(dir: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir, ttl })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash_key(key)))
    }

    async fn read_entry(path: &Path) -> Result<Option<CachedOffers>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Delete expired or unreadable entries, returning how many were removed
    pub async fn clear_expired(&self) -> Result<usize> {
        let mut cleared = 0;
        for path in self.entry_files().await? {
            let expired = match Self::read_entry(&path).await {
                Ok(Some(entry)) => entry.is_expired(self.ttl),
                Ok(None) => false,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Removing unreadable cache entry");
                    true
                }
            };
            if expired && Self::remove(&path).await? {
                cleared += 1;
            }
        }
        tracing::info!(cleared = cleared, "Cleared expired cache entries");
        Ok(cleared)
    }

    /// Delete every entry, returning how many were removed
    pub async fn clear_all(&self) -> Result<usize> {
        let mut cleared = 0;
        for path in self.entry_files().await? {
            if Self::remove(&path).await? {
                cleared += 1;
            }
        }
        tracing::info!(cleared = cleared, "Cleared all cache entries");
        Ok(cleared)
    }
}

#[async_trait]
impl OfferCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Offer>>> {
        let path = self.entry_path(key);

        let entry = match Self::read_entry(&path).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding corrupt cache entry");
                Self::remove(&path).await?;
                return Ok(None);
            }
        };

        match entry {
            Some(entry) if entry.is_expired(self.ttl) => {
                tracing::debug!(key = %key, "Cache entry expired");
                Self::remove(&path).await?;
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.offers)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, offers: &[Offer]) -> Result<()> {
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(&CachedOffers::new(key, offers))?;

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

// ============================================================================
// Redis cache
// ============================================================================

/// Redis-backed cache
pub struct RedisCache {
    pool: Pool,
    ttl: Duration,
    key_prefix: String,
}

impl RedisCache {
    /// Connect and verify the server answers PING
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self> {
        let pool = PoolConfig::from_url(url)
            .builder()
            .map_err(|e| Error::cache(format!("Failed to create pool builder: {e}")))?
            .max_size(8)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| Error::cache(format!("Failed to create Redis connection pool: {e}")))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| Error::cache(format!("Failed to get Redis connection: {e}")))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::cache(format!("Failed to ping Redis: {e}")))?;

        tracing::info!(url = %url, "Connected to Redis");

        Ok(Self {
            pool,
            ttl,
            key_prefix: "partscout:offers".to_string(),
        })
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, hash_key(key))
    }
}

#[async_trait]
impl OfferCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Offer>>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::cache(format!("Failed to get connection: {e}")))?;

        let value: Option<Vec<u8>> = conn
            .get(self.redis_key(key))
            .await
            .map_err(|e| Error::cache(format!("Failed to get from cache: {e}")))?;

        match value {
            Some(bytes) => {
                let entry: CachedOffers = serde_json::from_slice(&bytes)?;
                Ok(Some(entry.offers))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, offers: &[Offer]) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| Error::cache(format!("Failed to get connection: {e}")))?;

        let bytes = serde_json::to_vec(&CachedOffers::new(key, offers))?;

        conn.set_ex::<_, _, ()>(self.redis_key(key), bytes, self.ttl.as_secs())
            .await
            .map_err(|e| Error::cache(format!("Failed to set cache: {e}")))?;

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

// ============================================================================
// No-op cache
// ============================================================================

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl OfferCache for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<Offer>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _offers: &[Offer]) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Build the configured cache, degrading to [`NoCache`] if it cannot start
pub async fn build_cache(config: &GuardsConfig) -> Arc<dyn OfferCache> {
    let ttl = Duration::from_secs(config.cache_ttl_secs);

    match config.cache_backend {
        CacheBackend::None => Arc::new(NoCache),
        CacheBackend::File => match FileCache::open(&config.cache_dir, ttl).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                tracing::warn!(error = %e, "File cache unavailable, continuing without cache");
                Arc::new(NoCache)
            }
        },
        CacheBackend::Redis => {
            let url = config.redis_url.as_deref().unwrap_or("redis://localhost:6379");
            match RedisCache::connect(url, ttl).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    tracing::warn!(error = %e, "Redis cache unavailable, continuing without cache");
                    Arc::new(NoCache)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use rust_decimal::Decimal;

    fn offers() -> Vec<Offer> {
        vec![Offer::new(Provider::Berg, "OC90", "MAHLE", Decimal::from(410)).with_quantity(3)]
    }

    #[test]
    fn test_hash_key() {
        let a = hash_key("berg:OC90:");
        assert_eq!(a, hash_key("berg:OC90:"));
        assert_ne!(a, hash_key("berg:OC90:MAHLE"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_entry_expiry() {
        let mut entry = CachedOffers::new("k", &[]);
        assert!(!entry.is_expired(Duration::from_secs(60)));
        entry.cached_at -= 120;
        assert!(entry.is_expired(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_file_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), Duration::from_secs(60)).await.unwrap();

        assert!(cache.get("berg:OC90:").await.unwrap().is_none());
        cache.set("berg:OC90:", &offers()).await.unwrap();
        assert_eq!(cache.get("berg:OC90:").await.unwrap(), Some(offers()));
    }

    #[tokio::test]
    async fn test_no_cache_never_hits() {
        let cache = NoCache;
        cache.set("k", &offers()).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn test_build_cache_none_backend() {
        let cache = build_cache(&GuardsConfig::default()).await;
        assert_eq!(cache.backend(), "none");
    }

    #[tokio::test]
    #[ignore = "Requires running Redis"]
    async fn test_redis_cache_roundtrip() {
        let cache = RedisCache::connect("redis://localhost:6379", Duration::from_secs(60))
            .await
            .unwrap();
        cache.set("test:OC90:", &offers()).await.unwrap();
        assert_eq!(cache.get("test:OC90:").await.unwrap(), Some(offers()));
    }
}
