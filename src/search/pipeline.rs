//! Aggregation of raw supplier offers into the final answer
//!
//! Runs deduplication, availability filtering, tagging, tiered sorting and
//! finally markup with rounding. Pure: the same input always yields the
//! same output.

use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{AvailabilityFilter, Offer, SearchRequest, SortBy};
use crate::utils::{apply_markup, matches_region, normalize_article};

/// Coarse priority bucket: 0 original, 1 requested article, 2 other analog
pub fn tier(offer: &Offer) -> u8 {
    if offer.is_original {
        0
    } else if offer.is_requested {
        1
    } else {
        2
    }
}

/// Keep one offer per article, brand and warehouse; the cheaper one wins
fn dedup_per_warehouse(offers: &[Offer]) -> Vec<Offer> {
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();
    let mut result: Vec<Offer> = Vec::new();

    for offer in offers {
        let key = (
            offer.normalized_article(),
            offer.brand_key(),
            offer.warehouse.trim().to_uppercase(),
        );
        match index.get(&key) {
            Some(&pos) => {
                if offer.price < result[pos].price {
                    result[pos] = offer.clone();
                }
            }
            None => {
                index.insert(key, result.len());
                result.push(offer.clone());
            }
        }
    }

    result
}

/// Keep the cheapest and the fastest offer of each article and brand
fn dedup_best_pick(offers: &[Offer]) -> Vec<Offer> {
    struct Best<'a> {
        cheapest: &'a Offer,
        fastest: &'a Offer,
    }

    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<Best<'_>> = Vec::new();

    for offer in offers {
        let key = (offer.normalized_article(), offer.brand_key());
        match index.get(&key) {
            Some(&pos) => {
                let best = &mut groups[pos];
                if offer.price < best.cheapest.price {
                    best.cheapest = offer;
                }
                if offer.delivery_days < best.fastest.delivery_days {
                    best.fastest = offer;
                }
            }
            None => {
                index.insert(key, groups.len());
                groups.push(Best {
                    cheapest: offer,
                    fastest: offer,
                });
            }
        }
    }

    let mut result = Vec::with_capacity(groups.len());
    for Best { cheapest, fastest } in groups {
        result.push(cheapest.clone());
        let distinct = cheapest.provider != fastest.provider
            || cheapest.warehouse != fastest.warehouse
            || cheapest.price != fastest.price;
        if distinct {
            result.push(fastest.clone());
        }
    }
    result
}

/// Deduplicate offers according to the availability filter
pub fn deduplicate(offers: &[Offer], filter: AvailabilityFilter) -> Vec<Offer> {
    match filter {
        AvailabilityFilter::InStockPrimary => dedup_per_warehouse(offers),
        AvailabilityFilter::None | AvailabilityFilter::OnOrder => dedup_best_pick(offers),
    }
}

/// Whether an offer passes the availability filter
pub fn passes_filter(offer: &Offer, filter: AvailabilityFilter, home_marker: &str) -> bool {
    match filter {
        AvailabilityFilter::None => true,
        AvailabilityFilter::InStockPrimary => {
            matches_region(&offer.warehouse, home_marker) && offer.delivery_days <= 1
        }
        AvailabilityFilter::OnOrder => offer.delivery_days > 1,
    }
}

/// Set `is_original` and `is_requested`
pub fn tag(offer: &mut Offer, normalized_query: &str) {
    offer.is_original = !offer.is_cross;
    offer.is_requested = offer.normalized_article() == normalized_query;
}

fn compare(a: &Offer, b: &Offer, sort_by: SortBy) -> Ordering {
    let secondary = match sort_by {
        SortBy::PriceAsc => a.price.cmp(&b.price),
        SortBy::PriceDesc => b.price.cmp(&a.price),
        SortBy::DeliveryAsc | SortBy::None => a.delivery_days.cmp(&b.delivery_days),
    };
    tier(a).cmp(&tier(b)).then(secondary)
}

/// Apply markup unless the supplier already did, then round up
///
/// Returns `false` when the marked-up price overflows; the offer is left untouched.
pub fn finalize_price(offer: &mut Offer, markup_percent: Decimal) -> bool {
    if !offer.markup_applied && !markup_percent.is_zero() {
        let Some(price) = apply_markup(offer.price, markup_percent) else {
            return false;
        };
        offer.price = price;
        offer.markup_applied = true;
    }
    offer.price = offer.price.ceil();
    true
}

/// Turn the merged supplier offers into the ordered answer
pub fn aggregate(offers: &[Offer], request: &SearchRequest, home_marker: &str) -> Vec<Offer> {
    let normalized_query = normalize_article(&request.article);
    let markup = request.markup_percent.max(Decimal::ZERO);

    let mut result: Vec<Offer> = deduplicate(offers, request.availability_filter)
        .into_iter()
        .filter(|o| passes_filter(o, request.availability_filter, home_marker))
        .collect();

    for offer in &mut result {
        tag(offer, &normalized_query);
    }

    result.sort_by(|a, b| compare(a, b, request.sort_by));

    result.retain_mut(|offer| {
        let priced = finalize_price(offer, markup);
        if !priced {
            tracing::warn!(
                provider = %offer.provider,
                article = %offer.article,
                price = %offer.price,
                "Dropping offer whose marked-up price overflows"
            );
        }
        priced
    });

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;

    fn dec(v: &str) -> Decimal {
        v.parse().unwrap()
    }

    fn offer(provider: Provider, article: &str, brand: &str, price: &str, days: u32) -> Offer {
        Offer::new(provider, article, brand, dec(price))
            .with_delivery(days)
            .with_warehouse("Москва")
            .with_quantity(1)
    }

    #[test]
    fn test_best_pick_keeps_cheapest_and_fastest() {
        let offers = vec![
            offer(Provider::Berg, "OC90", "MAHLE", "400", 5),
            offer(Provider::Rossko, "OC-90", "mahle", "450", 0),
            offer(Provider::Autotrade, "OC90", "MAHLE", "420", 3),
        ];
        let result = deduplicate(&offers, AvailabilityFilter::None);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].provider, Provider::Berg);
        assert_eq!(result[1].provider, Provider::Rossko);
    }

    #[test]
    fn test_best_pick_collapses_single_winner() {
        let offers = vec![
            offer(Provider::Berg, "OC90", "MAHLE", "400", 0),
            offer(Provider::Rossko, "OC90", "MAHLE", "450", 2),
        ];
        assert_eq!(deduplicate(&offers, AvailabilityFilter::None).len(), 1);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let offers = vec![
            offer(Provider::Berg, "OC90", "MAHLE", "400", 1),
            offer(Provider::Rossko, "OC90", "MAHLE", "400", 1),
        ];
        let result = deduplicate(&offers, AvailabilityFilter::None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].provider, Provider::Berg);
    }

    #[test]
    fn test_per_warehouse_dedup() {
        let offers = vec![
            offer(Provider::Berg, "OC90", "MAHLE", "400", 1).with_warehouse("Тюмень"),
            offer(Provider::Rossko, "OC90", "MAHLE", "380", 1).with_warehouse("тюмень"),
            offer(Provider::Rossko, "OC90", "MAHLE", "390", 1).with_warehouse("Тюмень 2"),
        ];
        let result = deduplicate(&offers, AvailabilityFilter::InStockPrimary);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].price, dec("380"));
    }

    #[test]
    fn test_filters() {
        let home = offer(Provider::Berg, "A", "B", "1", 1).with_warehouse("Тюмень, склад");
        let far = offer(Provider::Berg, "A", "B", "1", 3);
        assert!(passes_filter(&home, AvailabilityFilter::InStockPrimary, "тюмень"));
        assert!(!passes_filter(&far, AvailabilityFilter::InStockPrimary, "тюмень"));
        assert!(passes_filter(&far, AvailabilityFilter::OnOrder, "тюмень"));
        assert!(!passes_filter(&home, AvailabilityFilter::OnOrder, "тюмень"));
        assert!(passes_filter(&far, AvailabilityFilter::None, "тюмень"));
    }

    #[test]
    fn test_tier_dominates_sort() {
        let offers = vec![
            offer(Provider::Berg, "X1", "ANALOG", "10", 0).with_cross(true),
            offer(Provider::Berg, "Q1", "ORIG", "900", 9),
            offer(Provider::Berg, "Q-1", "OTHER", "50", 0).with_cross(true),
        ];
        for sort_by in [SortBy::None, SortBy::PriceAsc, SortBy::PriceDesc, SortBy::DeliveryAsc] {
            let request = SearchRequest::new("Q1").with_sort(sort_by);
            let result = aggregate(&offers, &request, "тюмень");
            let tiers: Vec<u8> = result.iter().map(tier).collect();
            assert_eq!(tiers, vec![0, 1, 2], "sort {sort_by:?}");
        }
    }

    #[test]
    fn test_price_desc_within_tier() {
        let offers = vec![
            offer(Provider::Berg, "A", "B1", "10", 0),
            offer(Provider::Berg, "C", "B2", "30", 0),
            offer(Provider::Berg, "D", "B3", "20", 0),
        ];
        let request = SearchRequest::new("Q").with_sort(SortBy::PriceDesc);
        let prices: Vec<Decimal> = aggregate(&offers, &request, "").iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![dec("30"), dec("20"), dec("10")]);
    }

    #[test]
    fn test_markup_and_ceiling() {
        let mut plain = offer(Provider::Berg, "A", "B", "121.5", 0);
        assert!(finalize_price(&mut plain, dec("10")));
        assert_eq!(plain.price, dec("134"));

        let mut priced = offer(Provider::Rossko, "A", "B", "133.65", 0);
        priced.markup_applied = true;
        assert!(finalize_price(&mut priced, dec("10")));
        assert_eq!(priced.price, dec("134"));
    }

    #[test]
    fn test_overflowing_price_drops_only_that_offer() {
        let mut huge = offer(Provider::Berg, "OC90", "MAHLE", "1", 0);
        huge.price = Decimal::MAX;
        let offers = vec![huge, offer(Provider::Berg, "OC90", "KNECHT", "400", 1)];

        let request = SearchRequest::new("OC90").with_markup(dec("10"));
        let result = aggregate(&offers, &request, "");

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].brand, "KNECHT");
        assert_eq!(result[0].price, dec("440"));
    }

    #[test]
    fn test_tags() {
        let mut o = offer(Provider::Berg, "15208-aa100", "X", "1", 0).with_cross(true);
        tag(&mut o, "15208AA100");
        assert!(!o.is_original);
        assert!(o.is_requested);
    }
}
