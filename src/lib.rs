//! partscout - multi-supplier auto parts offer aggregation
//!
//! Queries several incompatible supplier back-ends for an article code and
//! merges their answers into one deduplicated, prioritized offer list.
//!
//! # Architecture
//!
//! - [`models`] - canonical offer and search request types
//! - [`suppliers`] - one adapter per supplier protocol
//! - [`guard`] - rate limiting and caching decorators for adapters
//! - [`cache`] - offer cache backends (file, Redis)
//! - [`search`] - fan-out, cross-reference fallback, aggregation pipeline
//! - [`server`] - HTTP API
//! - [`config`] - configuration from environment or TOML
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - article code helpers and low-level errors
//!
//! # Example
//!
//! ```no_run
//! use partscout::config::Config;
//! use partscout::models::SearchRequest;
//! use partscout::search::SearchEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let engine = SearchEngine::from_config(&config).await;
//!     let offers = engine.search_offers(&SearchRequest::new("15208-AA100")).await;
//!     println!("{} offers", offers.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod models;
pub mod search;
pub mod server;
pub mod suppliers;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, ScoutErrorTrait};
    pub use crate::models::{AvailabilityFilter, Offer, Provider, SearchRequest, SortBy};
    pub use crate::search::SearchEngine;
    pub use crate::suppliers::{SupplierClient, SupplierError};
}

pub use models::{Offer, Provider, SearchRequest};
pub use search::SearchEngine;
