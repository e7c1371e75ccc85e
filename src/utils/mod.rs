//! Article code helpers shared by adapters, the fallback search and the pipeline

pub mod error;

use regex::Regex;
use rust_decimal::Decimal;
use std::sync::OnceLock;

/// Characters stripped when comparing article codes
const ARTICLE_SEPARATORS: [char; 3] = ['-', ' ', '/'];

/// Normalize an article code for comparison
///
/// Uppercases and strips dashes, spaces and slashes.
pub fn normalize_article(article: &str) -> String {
    article
        .chars()
        .filter(|c| !ARTICLE_SEPARATORS.contains(c))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Check whether two article codes denote the same part number
pub fn is_exact_match(search_article: &str, result_article: &str) -> bool {
    normalize_article(search_article) == normalize_article(result_article)
}

/// Remove separators but keep the original case
pub fn strip_separators(article: &str) -> String {
    article
        .chars()
        .filter(|c| !ARTICLE_SEPARATORS.contains(c))
        .collect()
}

/// First run of ASCII digits in an article code, if any
pub fn leading_number(article: &str) -> Option<&str> {
    static DIGITS_RE: OnceLock<Regex> = OnceLock::new();

    let re = DIGITS_RE.get_or_init(|| Regex::new(r"[0-9]+").expect("Invalid regex pattern"));

    re.find(article).map(|m| m.as_str())
}

/// Apply a percentage markup to a price
///
/// Returns `None` when the result does not fit in a `Decimal`.
pub fn apply_markup(price: Decimal, markup_percent: Decimal) -> Option<Decimal> {
    if markup_percent.is_zero() {
        return Some(price);
    }
    let factor = Decimal::ONE.checked_add(markup_percent.checked_div(Decimal::ONE_HUNDRED)?)?;
    price.checked_mul(factor)
}

/// Check whether a warehouse name contains the home region marker
pub fn matches_region(warehouse: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    warehouse.to_lowercase().contains(&marker.to_lowercase())
}

/// Truncate text to a maximum number of characters for log output
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
