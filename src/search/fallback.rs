//! Cross-reference fallback for a primary supplier that found nothing
//!
//! Articles surfaced by the other suppliers are turned into candidate codes
//! (separator and prefix variants, plus common suffix combinations) and the
//! primary supplier is asked again for a handful of them.

use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;

use super::orchestrator::fetch_one;
use crate::metrics;
use crate::models::{Offer, Provider};
use crate::suppliers::{DynSupplier, FetchOptions, SupplierClient};
use crate::utils::{is_exact_match, leading_number, normalize_article, strip_separators};

/// Aftermarket prefix some suppliers put in front of OEM numbers
const ANALOG_PREFIX: &str = "ST";

/// Suffix codes tried with the numeric part of long article numbers
const COMMON_SUFFIXES: [&str; 4] = ["H5103", "1PA1A", "AA100", "35503"];

/// Minimum digit run length for suffix combinations
const MIN_BASE_DIGITS: usize = 5;

/// Fallback limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackLimits {
    /// Distinct source articles taken from other suppliers
    pub max_articles: usize,
    /// Candidate codes sent to the primary supplier
    pub max_candidates: usize,
}

impl Default for FallbackLimits {
    fn default() -> Self {
        Self {
            max_articles: 20,
            max_candidates: 3,
        }
    }
}

/// Strip an aftermarket prefix (`ST-` or `ST` before a digit)
fn strip_analog_prefix(article: &str) -> &str {
    let has_prefix = |len: usize| {
        article
            .get(..len)
            .and_then(|p| p.get(..2))
            .is_some_and(|p| p.eq_ignore_ascii_case(ANALOG_PREFIX))
    };

    if has_prefix(3) && article[2..].starts_with('-') {
        return &article[3..];
    }
    if has_prefix(2) && article[2..].starts_with(|c: char| c.is_ascii_digit()) {
        return &article[2..];
    }
    article
}

/// Candidate codes for one source article, most likely first
pub fn article_variants(article: &str) -> Vec<String> {
    let article = article.trim();
    if article.is_empty() {
        return Vec::new();
    }

    let core = strip_analog_prefix(article);
    let compact_core = strip_separators(core);

    let mut variants = vec![
        compact_core.clone(),
        format!("{ANALOG_PREFIX}-{compact_core}"),
        strip_separators(article),
        article.to_string(),
        core.to_string(),
        format!("{ANALOG_PREFIX}-{core}"),
    ];

    if let Some(base) = leading_number(core).filter(|d| d.len() >= MIN_BASE_DIGITS) {
        for suffix in COMMON_SUFFIXES {
            variants.push(format!("{base}-{suffix}"));
            variants.push(format!("{ANALOG_PREFIX}-{base}-{suffix}"));
        }
    }

    let mut seen = HashSet::new();
    variants.retain(|v| !v.is_empty() && seen.insert(v.clone()));
    variants
}

/// Pick source articles from other suppliers' offers
///
/// Crosses come before originals, and each brand gets one article before
/// any brand gets a second. Articles equal to the query are skipped.
pub fn collect_source_articles(offers: &[Offer], query: &str, max_articles: usize) -> Vec<String> {
    let normalized_query = normalize_article(query);

    let mut ordered: Vec<&Offer> = offers.iter().filter(|o| o.is_cross).collect();
    ordered.extend(offers.iter().filter(|o| !o.is_cross));

    let mut seen_articles = HashSet::new();
    let mut candidates: Vec<(&str, String)> = Vec::new();
    for offer in ordered {
        let article = offer.article.trim();
        let normalized = normalize_article(article);
        if normalized.is_empty() || normalized == normalized_query {
            continue;
        }
        if seen_articles.insert(normalized) {
            candidates.push((article, offer.brand_key()));
        }
    }

    let mut seen_brands = HashSet::new();
    let (first_per_brand, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|(_, brand)| seen_brands.insert(brand.clone()));

    first_per_brand
        .into_iter()
        .chain(rest)
        .map(|(article, _)| article.to_string())
        .take(max_articles)
        .collect()
}

/// Candidate codes to send to the primary supplier
pub fn candidate_codes(offers: &[Offer], query: &str, limits: FallbackLimits) -> Vec<String> {
    let mut seen = HashSet::new();
    collect_source_articles(offers, query, limits.max_articles)
        .iter()
        .flat_map(|article| article_variants(article))
        .filter(|code| seen.insert(code.clone()))
        .take(limits.max_candidates)
        .collect()
}

/// Attribute a fallback hit to the primary supplier
///
/// The supplier judged the cross flag against the candidate code it was
/// asked for; anything that is not the user's article is an analog.
fn retag(mut offer: Offer, provider: Provider, query: &str) -> Offer {
    offer.provider = provider;
    offer.is_cross |= !is_exact_match(query, &offer.article);
    offer.is_original = !offer.is_cross;
    offer
}

/// Re-query the primary supplier with codes mined from other suppliers
///
/// Hits are re-tagged with the primary supplier's provider and flagged as
/// crosses unless they match the query.
pub async fn run(
    primary: &DynSupplier,
    other_offers: &[Offer],
    query: &str,
    opts: &FetchOptions,
    limits: FallbackLimits,
    deadline: Duration,
) -> Vec<Offer> {
    let provider = primary.provider();
    let codes = candidate_codes(other_offers, query, limits);

    if codes.is_empty() {
        tracing::info!(provider = %provider, query = %query, "No cross-reference candidates for fallback");
        metrics::record_fallback(false);
        return Vec::new();
    }

    tracing::info!(provider = %provider, query = %query, candidates = ?codes, "Running cross-reference fallback");

    let calls = codes
        .iter()
        .map(|code| fetch_one(primary, code, None, opts, deadline));

    let offers: Vec<Offer> = join_all(calls)
        .await
        .into_iter()
        .flatten()
        .map(|offer| retag(offer, provider, query))
        .collect();

    metrics::record_fallback(!offers.is_empty());
    tracing::info!(provider = %provider, count = offers.len(), "Cross-reference fallback finished");
    offers
}
