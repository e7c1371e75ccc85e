//! Rate limiting and caching in front of supplier adapters
//!
//! [`GuardedClient`] decorates any [`SupplierClient`]. A cache hit skips the
//! supplier entirely; a limiter denial fails the call with
//! [`FetchError::RateLimit`] instead of waiting.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota,
    RateLimiter as GovernorLimiter,
};
use rust_decimal::Decimal;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::OfferCache;
use crate::config::GuardsConfig;
use crate::metrics;
use crate::models::{Offer, Provider};
use crate::suppliers::{FetchOptions, SupplierClient, SupplierError};
use crate::utils::error::FetchError;
use crate::utils::normalize_article;

/// Non-blocking admission check
pub trait RateLimiter: Send + Sync {
    /// Whether a call for `key` may proceed now
    fn allow(&self, key: &str) -> bool;
}

type KeyedGovernor = GovernorLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-key limiter allowing `max_requests` per `window`
pub struct KeyedRateLimiter {
    limiter: KeyedGovernor,
}

impl KeyedRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let period = window
            .checked_div(burst.get())
            .filter(|p| !p.is_zero())
            .unwrap_or(Duration::from_millis(1));

        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: GovernorLimiter::keyed(quota),
        }
    }

    pub fn from_config(config: &GuardsConfig) -> Self {
        Self::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }
}

impl RateLimiter for KeyedRateLimiter {
    fn allow(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }
}

/// Build the cache key for one supplier call
///
/// Markup is part of the key only when non-zero, since only Rossko prices
/// depend on it.
pub fn cache_key(provider: Provider, article: &str, brand: Option<&str>, markup: Decimal) -> String {
    let brand = brand.map(|b| b.trim().to_uppercase()).unwrap_or_default();
    let mut key = format!("{}:{}:{}", provider, normalize_article(article), brand);
    if !markup.is_zero() {
        key.push_str(&format!(":m{}", markup.normalize()));
    }
    key
}

/// Supplier client with an optional limiter and cache in front
pub struct GuardedClient<C> {
    inner: C,
    limiter: Option<Arc<dyn RateLimiter>>,
    cache: Option<Arc<dyn OfferCache>>,
}

impl<C: SupplierClient> GuardedClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            limiter: None,
            cache: None,
        }
    }

    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn OfferCache>) -> Self {
        self.cache = cache.is_enabled().then_some(cache);
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn cached(&self, key: &str) -> Option<Vec<Offer>> {
        let cache = self.cache.as_ref()?;
        let provider = self.inner.provider();

        match cache.get(key).await {
            Ok(Some(offers)) => {
                metrics::record_cache_lookup(provider, true);
                tracing::debug!(provider = %provider, key = %key, count = offers.len(), "Cache hit");
                Some(offers)
            }
            Ok(None) => {
                metrics::record_cache_lookup(provider, false);
                None
            }
            Err(e) => {
                tracing::warn!(provider = %provider, backend = cache.backend(), error = %e, "Cache read failed");
                None
            }
        }
    }

    async fn store(&self, key: &str, offers: &[Offer]) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if offers.is_empty() || offers.iter().any(|o| o.synthetic) {
            return;
        }
        if let Err(e) = cache.set(key, offers).await {
            tracing::warn!(
                provider = %self.inner.provider(),
                backend = cache.backend(),
                error = %e,
                "Cache write failed"
            );
        }
    }
}

#[async_trait]
impl<C: SupplierClient> SupplierClient for GuardedClient<C> {
    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    async fn fetch(
        &self,
        article: &str,
        brand: Option<&str>,
        opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError> {
        let provider = self.inner.provider();
        let key = cache_key(provider, article, brand, opts.markup_percent);

        if let Some(offers) = self.cached(&key).await {
            return Ok(offers);
        }

        if let Some(limiter) = &self.limiter {
            if !limiter.allow(provider.as_str()) {
                tracing::info!(provider = %provider, article = %article, "Rate limit reached, skipping supplier");
                return Err(SupplierError::fetch(provider, FetchError::RateLimit));
            }
        }

        let offers = self.inner.fetch(article, brand, opts).await?;
        self.store(&key, &offers).await;
        Ok(offers)
    }
}
