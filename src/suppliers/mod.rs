//! Supplier adapters
//!
//! Each adapter translates one supplier's wire protocol into canonical
//! [`Offer`] values. Adapters share no mutable state between calls and take
//! their configuration (credentials, base URL) at construction, so tests can
//! point them at a fake endpoint.
//!
//! # Modules
//!
//! - [`rossko`] - SOAP search with nested warehouse stocks and crosses
//! - [`autotrade`] - JSON-over-form search with per-warehouse stocks
//! - [`berg`] - REST stock lookup with ambiguous-article re-query
//! - [`autostels`] - two-step SOAP search (brand candidates, then offers)
//! - [`availability`] - per-supplier in-stock rules
//! - [`decode`] - tolerant per-field decoding of loosely typed payloads
//! - [`transport`] - shared HTTP plumbing

pub mod autostels;
pub mod autotrade;
pub mod availability;
pub mod berg;
pub mod decode;
pub mod rossko;
pub mod transport;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::error::{ErrorCategory, ScoutErrorTrait};
use crate::models::{Offer, Provider};
use crate::utils::error::{FetchError, ParseError};

pub use autostels::AutostelsClient;
pub use autotrade::AutotradeClient;
pub use availability::AvailabilityPolicy;
pub use berg::BergClient;
pub use rossko::RosskoClient;

/// Per-call options passed to adapters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Markup for adapters that price offers themselves
    pub markup_percent: Decimal,
}

impl FetchOptions {
    pub fn with_markup(markup_percent: Decimal) -> Self {
        Self { markup_percent }
    }
}

/// Failure of one adapter call
#[derive(Error, Debug)]
pub enum SupplierError {
    /// Transport failure
    #[error("{provider}: {source}")]
    Fetch {
        provider: Provider,
        #[source]
        source: FetchError,
    },

    /// Payload could not be decoded, or the supplier reported an error
    #[error("{provider}: {source}")]
    Parse {
        provider: Provider,
        #[source]
        source: ParseError,
    },

    /// Adapter lacks credentials or other required settings
    #[error("{provider}: not configured ({reason})")]
    NotConfigured { provider: Provider, reason: String },
}

impl SupplierError {
    pub fn fetch(provider: Provider, source: FetchError) -> Self {
        Self::Fetch { provider, source }
    }

    pub fn parse(provider: Provider, source: ParseError) -> Self {
        Self::Parse { provider, source }
    }

    pub fn not_configured(provider: Provider, reason: impl Into<String>) -> Self {
        Self::NotConfigured {
            provider,
            reason: reason.into(),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            Self::Fetch { provider, .. }
            | Self::Parse { provider, .. }
            | Self::NotConfigured { provider, .. } => *provider,
        }
    }

    /// Whether the limiter, not the supplier, refused the call
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                source: FetchError::RateLimit,
                ..
            }
        )
    }
}

impl ScoutErrorTrait for SupplierError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch { source, .. } => source.is_recoverable(),
            Self::Parse { .. } | Self::NotConfigured { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch { .. } => ErrorCategory::Network,
            Self::Parse {
                source: ParseError::Supplier(_),
                ..
            } => ErrorCategory::Supplier,
            Self::Parse { .. } => ErrorCategory::Parsing,
            Self::NotConfigured { .. } => ErrorCategory::Config,
        }
    }
}

/// Capability to query one supplier for offers
#[async_trait]
pub trait SupplierClient: Send + Sync {
    /// Supplier this client talks to
    fn provider(&self) -> Provider;

    /// Query the supplier for an article
    ///
    /// Errors describe why nothing came back; callers treat them as an empty
    /// result.
    async fn fetch(
        &self,
        article: &str,
        brand: Option<&str>,
        opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError>;
}

#[async_trait]
impl<T: SupplierClient + ?Sized> SupplierClient for Arc<T> {
    fn provider(&self) -> Provider {
        (**self).provider()
    }

    async fn fetch(
        &self,
        article: &str,
        brand: Option<&str>,
        opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError> {
        (**self).fetch(article, brand, opts).await
    }
}

/// Shared handle to an adapter
pub type DynSupplier = Arc<dyn SupplierClient>;

/// Build one adapter from configuration
pub fn build_client(provider: Provider, config: &Config) -> Result<DynSupplier, SupplierError> {
    let client: DynSupplier = match provider {
        Provider::Rossko => Arc::new(RosskoClient::new(config.rossko.clone())?),
        Provider::Autotrade => Arc::new(
            AutotradeClient::new(config.autotrade.clone())?.with_policy(
                AvailabilityPolicy::home_region(config.search.home_region_marker.clone()),
            ),
        ),
        Provider::Berg => Arc::new(BergClient::new(config.berg.clone())?),
        Provider::Autostels => Arc::new(AutostelsClient::new(config.autostels.clone())?),
    };
    Ok(client)
}
