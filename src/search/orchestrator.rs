//! Concurrent fan-out over supplier adapters

use futures::future::join_all;
use std::time::{Duration, Instant};

use crate::metrics::{self, CallOutcome};
use crate::models::{Offer, Provider};
use crate::suppliers::{DynSupplier, FetchOptions, SupplierClient};

/// Offers returned by one adapter
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResult {
    pub provider: Provider,
    pub offers: Vec<Offer>,
}

/// Query one adapter with a deadline
///
/// Errors, limiter denials and timeouts all come back as an empty list.
pub async fn fetch_one(
    client: &DynSupplier,
    article: &str,
    brand: Option<&str>,
    opts: &FetchOptions,
    deadline: Duration,
) -> Vec<Offer> {
    let provider = client.provider();
    let started = Instant::now();

    let (outcome, offers) =
        match tokio::time::timeout(deadline, client.fetch(article, brand, opts)).await {
            Ok(Ok(offers)) if offers.is_empty() => (CallOutcome::Empty, offers),
            Ok(Ok(offers)) => (CallOutcome::Ok, offers),
            Ok(Err(e)) if e.is_rate_limited() => {
                tracing::info!(provider = %provider, article = %article, "Supplier call skipped by rate limiter");
                (CallOutcome::Limited, Vec::new())
            }
            Ok(Err(e)) => {
                tracing::warn!(provider = %provider, article = %article, error = %e, "Supplier call failed");
                (CallOutcome::Error, Vec::new())
            }
            Err(_) => {
                tracing::warn!(
                    provider = %provider,
                    article = %article,
                    timeout_ms = deadline.as_millis() as u64,
                    "Supplier call timed out"
                );
                (CallOutcome::Timeout, Vec::new())
            }
        };

    let elapsed = started.elapsed();
    metrics::record_supplier_call(provider, outcome, offers.len(), elapsed.as_secs_f64());
    tracing::debug!(
        provider = %provider,
        outcome = outcome.as_str(),
        count = offers.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Supplier call finished"
    );

    offers
}

/// Query every adapter concurrently
///
/// Results are returned in registration order regardless of completion order.
pub async fn fetch_all(
    clients: &[DynSupplier],
    article: &str,
    brand: Option<&str>,
    opts: &FetchOptions,
    deadline: Duration,
) -> Vec<ProviderResult> {
    let calls = clients
        .iter()
        .map(|client| fetch_one(client, article, brand, opts, deadline));

    join_all(calls)
        .await
        .into_iter()
        .zip(clients)
        .map(|(offers, client)| ProviderResult {
            provider: client.provider(),
            offers,
        })
        .collect()
}
