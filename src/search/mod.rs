//! Multi-supplier search
//!
//! [`SearchEngine::search_offers`] fans a request out to every registered
//! supplier, runs the cross-reference fallback when the primary supplier
//! found nothing, and aggregates the merged offers.
//!
//! # Modules
//!
//! - [`orchestrator`] - concurrent, time-bounded adapter calls
//! - [`fallback`] - candidate code generation and primary re-query
//! - [`pipeline`] - dedup, filtering, tiered sort, markup

pub mod fallback;
pub mod orchestrator;
pub mod pipeline;

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::cache::{build_cache, OfferCache};
use crate::config::{Config, SearchConfig};
use crate::guard::{GuardedClient, KeyedRateLimiter, RateLimiter};
use crate::metrics;
use crate::models::{Offer, Provider, SearchRequest};
use crate::suppliers::{build_client, DynSupplier, FetchOptions, SupplierClient};

pub use fallback::FallbackLimits;
pub use orchestrator::ProviderResult;

/// Engine behaviour independent of the registered suppliers
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub adapter_timeout: Duration,
    pub primary_provider: Provider,
    pub fallback_enabled: bool,
    pub fallback: FallbackLimits,
    pub home_region_marker: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for EngineSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
            primary_provider: config.primary_provider,
            fallback_enabled: config.fallback_enabled,
            fallback: FallbackLimits {
                max_articles: config.fallback_max_articles,
                max_candidates: config.fallback_max_candidates,
            },
            home_region_marker: config.home_region_marker.clone(),
        }
    }
}

/// Search entry point over a fixed set of suppliers
pub struct SearchEngine {
    clients: Vec<DynSupplier>,
    settings: EngineSettings,
}

impl SearchEngine {
    /// Create an engine; `clients` order is the registration order
    pub fn new(clients: Vec<DynSupplier>, settings: EngineSettings) -> Self {
        Self { clients, settings }
    }

    /// Build every configured supplier, wrapped in the configured guards
    ///
    /// Suppliers that cannot be constructed are skipped with a warning.
    pub async fn from_config(config: &Config) -> Self {
        let cache: Arc<dyn OfferCache> = build_cache(&config.guards).await;
        let limiter: Option<Arc<dyn RateLimiter>> = config
            .guards
            .rate_limit_enabled
            .then(|| Arc::new(KeyedRateLimiter::from_config(&config.guards)) as Arc<dyn RateLimiter>);

        let mut clients: Vec<DynSupplier> = Vec::new();
        for &provider in &config.search.providers {
            let client = match build_client(provider, config) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Skipping supplier");
                    continue;
                }
            };

            let mut guarded = GuardedClient::new(client).with_cache(Arc::clone(&cache));
            if let Some(limiter) = &limiter {
                guarded = guarded.with_limiter(Arc::clone(limiter));
            }
            clients.push(Arc::new(guarded));
        }

        tracing::info!(
            providers = ?clients.iter().map(|c| c.provider()).collect::<Vec<_>>(),
            cache = cache.backend(),
            rate_limit = config.guards.rate_limit_enabled,
            "Search engine ready"
        );

        Self::new(clients, EngineSettings::from(&config.search))
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Registered providers in registration order
    pub fn providers(&self) -> Vec<Provider> {
        self.clients.iter().map(|c| c.provider()).collect()
    }

    fn primary(&self) -> Option<&DynSupplier> {
        self.clients
            .iter()
            .find(|c| c.provider() == self.settings.primary_provider)
    }

    /// Search all suppliers and return the ordered, deduplicated offers
    ///
    /// Never fails: an unusable request yields an empty list.
    pub async fn search_offers(&self, request: &SearchRequest) -> Vec<Offer> {
        let span = tracing::info_span!("search", request_id = %Uuid::new_v4());
        self.search_inner(request).instrument(span).await
    }

    async fn search_inner(&self, request: &SearchRequest) -> Vec<Offer> {
        let _timer = metrics::start_search_timer();

        let mut request = request.clone();
        if request.markup_percent < Decimal::ZERO {
            tracing::warn!(markup = %request.markup_percent, "Negative markup clamped to zero");
            request.markup_percent = Decimal::ZERO;
        }
        if let Err(reason) = request.validate() {
            tracing::warn!(article = %request.article, reason = %reason, "Rejected search request");
            return Vec::new();
        }

        let article = request.article.trim();
        let brand = request.brand_filter();
        let opts = FetchOptions::with_markup(request.markup_percent);

        tracing::info!(
            article = %article,
            brand = ?brand,
            filter = request.availability_filter.as_str(),
            sort = request.sort_by.as_str(),
            "Searching offers"
        );

        let mut results = orchestrator::fetch_all(
            &self.clients,
            article,
            brand,
            &opts,
            self.settings.adapter_timeout,
        )
        .await;

        self.apply_fallback(&mut results, article, &opts).await;

        let merged: Vec<Offer> = results.into_iter().flat_map(|r| r.offers).collect();
        let offers = pipeline::aggregate(&merged, &request, &self.settings.home_region_marker);

        tracing::info!(article = %article, raw = merged.len(), count = offers.len(), "Search finished");
        offers
    }

    /// Re-query the primary supplier if, and only if, it found nothing
    async fn apply_fallback(&self, results: &mut [ProviderResult], article: &str, opts: &FetchOptions) {
        if !self.settings.fallback_enabled {
            return;
        }
        let Some(primary) = self.primary() else {
            return;
        };
        let provider = primary.provider();

        let Some(primary_pos) = results.iter().position(|r| r.provider == provider) else {
            return;
        };
        if !results[primary_pos].offers.is_empty() {
            return;
        }

        let others: Vec<Offer> = results
            .iter()
            .filter(|r| r.provider != provider)
            .flat_map(|r| r.offers.iter().cloned())
            .collect();

        tracing::info!(provider = %provider, article = %article, "Primary supplier returned nothing, trying cross-references");

        let found = fallback::run(
            primary,
            &others,
            article,
            opts,
            self.settings.fallback,
            self.settings.adapter_timeout,
        )
        .await;

        results[primary_pos].offers.extend(found);
    }
}
