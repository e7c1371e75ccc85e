//! Property tests for article normalization and the aggregation pipeline

use partscout::models::{AvailabilityFilter, Offer, Provider, SearchRequest, SortBy};
use partscout::search::pipeline::{aggregate, tier};
use partscout::utils::normalize_article;
use proptest::prelude::*;
use rust_decimal::Decimal;

const MARKER: &str = "тюмень";

fn provider_strategy() -> impl Strategy<Value = Provider> {
    prop_oneof![
        Just(Provider::Rossko),
        Just(Provider::Autotrade),
        Just(Provider::Berg),
        Just(Provider::Autostels),
    ]
}

fn offer_strategy() -> impl Strategy<Value = Offer> {
    (
        provider_strategy(),
        prop_oneof![Just("OC90"), Just("oc-90"), Just("W712/75"), Just("15208AA100")],
        prop_oneof![Just("MAHLE"), Just("MANN"), Just("SAT")],
        0u32..100_000,
        0u32..8,
        prop_oneof![Just("Тюмень, склад"), Just("Москва"), Just("Омск")],
        any::<bool>(),
    )
        .prop_map(|(provider, article, brand, cents, days, warehouse, is_cross)| {
            Offer::new(provider, article, brand, Decimal::new(i64::from(cents), 2))
                .with_delivery(days)
                .with_quantity(1)
                .with_warehouse(warehouse)
                .with_cross(is_cross)
        })
}

fn filter_strategy() -> impl Strategy<Value = AvailabilityFilter> {
    prop_oneof![
        Just(AvailabilityFilter::None),
        Just(AvailabilityFilter::InStockPrimary),
        Just(AvailabilityFilter::OnOrder),
    ]
}

fn sort_strategy() -> impl Strategy<Value = SortBy> {
    prop_oneof![
        Just(SortBy::None),
        Just(SortBy::PriceAsc),
        Just(SortBy::PriceDesc),
        Just(SortBy::DeliveryAsc),
    ]
}

fn request(filter: AvailabilityFilter, sort_by: SortBy, markup: u32) -> SearchRequest {
    SearchRequest::new("OC90")
        .with_filter(filter)
        .with_sort(sort_by)
        .with_markup(Decimal::from(markup))
}

proptest! {
    #[test]
    fn normalization_ignores_case_and_separators(article in "[A-Za-z0-9]{1,12}") {
        let upper = article.to_uppercase();
        let dashed: String = upper.chars().flat_map(|c| [c, '-']).collect();
        let spaced: String = article.chars().flat_map(|c| [' ', c, '/']).collect();

        prop_assert_eq!(normalize_article(&article), upper.clone());
        prop_assert_eq!(normalize_article(&dashed), upper.clone());
        prop_assert_eq!(normalize_article(&spaced), upper);
    }

    #[test]
    fn normalization_is_idempotent(article in "[ -~а-яА-ЯёЁ]{0,20}") {
        let once = normalize_article(&article);
        prop_assert_eq!(normalize_article(&once), once);
    }

    #[test]
    fn aggregate_is_deterministic(
        offers in prop::collection::vec(offer_strategy(), 0..20),
        filter in filter_strategy(),
        sort_by in sort_strategy(),
        markup in 0u32..50,
    ) {
        let req = request(filter, sort_by, markup);
        prop_assert_eq!(aggregate(&offers, &req, MARKER), aggregate(&offers, &req, MARKER));
    }

    #[test]
    fn tiers_never_decrease(
        offers in prop::collection::vec(offer_strategy(), 0..20),
        filter in filter_strategy(),
        sort_by in sort_strategy(),
    ) {
        let result = aggregate(&offers, &request(filter, sort_by, 0), MARKER);
        let tiers: Vec<u8> = result.iter().map(tier).collect();
        prop_assert!(tiers.windows(2).all(|w| w[0] <= w[1]), "tiers out of order: {:?}", tiers);
    }

    #[test]
    fn prices_are_marked_up_and_rounded(
        offer in offer_strategy(),
        markup in 0u32..200,
    ) {
        let raw = offer.price;
        let result = aggregate(&[offer], &request(AvailabilityFilter::None, SortBy::None, markup), MARKER);
        prop_assert_eq!(result.len(), 1);

        let expected = (raw * (Decimal::ONE + Decimal::from(markup) / Decimal::ONE_HUNDRED)).ceil();
        prop_assert_eq!(result[0].price, expected);
        prop_assert!(result[0].price.fract().is_zero());
    }

    #[test]
    fn availability_filters_hold(offers in prop::collection::vec(offer_strategy(), 0..20)) {
        let on_order = aggregate(&offers, &request(AvailabilityFilter::OnOrder, SortBy::None, 0), MARKER);
        prop_assert!(on_order.iter().all(|o| o.delivery_days > 1));

        let in_stock = aggregate(&offers, &request(AvailabilityFilter::InStockPrimary, SortBy::None, 0), MARKER);
        prop_assert!(in_stock
            .iter()
            .all(|o| o.warehouse.to_lowercase().contains(MARKER) && o.delivery_days <= 1));
    }

    #[test]
    fn output_never_grows(offers in prop::collection::vec(offer_strategy(), 0..20)) {
        let result = aggregate(&offers, &request(AvailabilityFilter::None, SortBy::None, 0), MARKER);
        prop_assert!(result.len() <= offers.len());
    }
}
