//! End-to-end search engine tests with scripted suppliers

mod common;

use common::{dec, offer, FakeSupplier};
use partscout::config::AutotradeConfig;
use partscout::models::{AvailabilityFilter, Provider, SearchRequest, SortBy};
use partscout::search::{EngineSettings, SearchEngine};
use partscout::suppliers::{AutotradeClient, DynSupplier};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> EngineSettings {
    EngineSettings {
        adapter_timeout: Duration::from_millis(500),
        ..EngineSettings::default()
    }
}

fn engine(clients: Vec<Arc<FakeSupplier>>) -> SearchEngine {
    let clients: Vec<DynSupplier> = clients.into_iter().map(|c| c as DynSupplier).collect();
    SearchEngine::new(clients, settings())
}

#[tokio::test]
async fn test_two_failing_suppliers_do_not_fail_search() {
    let rossko = Arc::new(FakeSupplier::new(Provider::Rossko).failing());
    let autotrade = Arc::new(
        FakeSupplier::new(Provider::Autotrade)
            .returning(vec![offer(Provider::Autotrade, "OC90", "MAHLE", "400", 1)]),
    );
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).delayed(Duration::from_secs(5)));
    let autostels = Arc::new(
        FakeSupplier::new(Provider::Autostels)
            .returning(vec![offer(Provider::Autostels, "W712/75", "MANN", "350", 3).with_cross(true)]),
    );

    let engine = engine(vec![rossko, autotrade, berg, autostels]);
    let offers = engine.search_offers(&SearchRequest::new("OC90")).await;

    let providers: Vec<Provider> = offers.iter().map(|o| o.provider).collect();
    assert_eq!(providers, vec![Provider::Autotrade, Provider::Autostels]);
}

#[tokio::test]
async fn test_requested_article_ordering() {
    let autotrade = Arc::new(FakeSupplier::new(Provider::Autotrade).returning(vec![
        offer(Provider::Autotrade, "26300-35503", "Z", "450", 3).with_cross(true),
        offer(Provider::Autotrade, "15208AA100", "X", "500", 0),
    ]));
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).returning(vec![offer(
        Provider::Berg,
        "ST-15208-AA100",
        "Y",
        "121",
        1,
    )
    .with_cross(true)]));

    let engine = engine(vec![autotrade, berg]);
    let offers = engine.search_offers(&SearchRequest::new("15208AA100")).await;

    let brands: Vec<&str> = offers.iter().map(|o| o.brand.as_str()).collect();
    assert_eq!(brands, vec!["X", "Y", "Z"]);
    assert!(offers[0].is_original && offers[0].is_requested);
    assert!(!offers[1].is_original);
}

#[tokio::test]
async fn test_fallback_hit_is_tagged_with_primary_provider() {
    let autotrade = Arc::new(FakeSupplier::new(Provider::Autotrade).answering(
        "ST-15208AA100",
        vec![offer(Provider::Berg, "ST-15208AA100", "SAT", "118", 0)],
    ));
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).returning(vec![offer(
        Provider::Berg,
        "ST-15208-AA100",
        "SAT",
        "121",
        2,
    )
    .with_cross(true)]));

    let engine = engine(vec![autotrade.clone(), berg]);
    let offers = engine.search_offers(&SearchRequest::new("54630-H5103")).await;

    let calls = autotrade.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], "54630-H5103");

    let mut variants = calls[1..].to_vec();
    variants.sort();
    assert_eq!(variants, vec!["15208AA100", "ST-15208AA100", "ST15208AA100"]);

    let hit = offers
        .iter()
        .find(|o| o.provider == Provider::Autotrade)
        .expect("fallback hit merged");
    assert_eq!(hit.price, dec("118"));
    assert!(hit.is_cross);
    assert!(!hit.is_original);
}

#[tokio::test]
async fn test_fallback_hit_from_live_primary_is_cross() {
    let server = MockServer::start().await;

    let sat_item = serde_json::json!({
        "code": 0,
        "items": [{
            "article": "ST-15208AA100",
            "brand_name": "SAT",
            "name": "Oil filter",
            "price": 118,
            "stocks": {
                "12": {"name": "Тюмень", "quantity_unpacked": 3, "quantity_packed": 0, "delivery_period": 0}
            }
        }]
    });

    Mock::given(method("POST"))
        .and(body_string_contains("ST-15208AA100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sat_item))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 0, "items": []})))
        .mount(&server)
        .await;

    let autotrade = AutotradeClient::new(AutotradeConfig {
        base_url: format!("{}/", server.uri()),
        login: "user".into(),
        password: "pass".into(),
        ..AutotradeConfig::default()
    })
    .unwrap();
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).returning(vec![offer(
        Provider::Berg,
        "ST-15208-AA100",
        "SAT",
        "121",
        2,
    )
    .with_cross(true)]));

    let clients: Vec<DynSupplier> = vec![Arc::new(autotrade), berg];
    let engine = SearchEngine::new(clients, settings());
    let offers = engine.search_offers(&SearchRequest::new("54630-H5103")).await;

    let hit = offers
        .iter()
        .find(|o| o.provider == Provider::Autotrade)
        .expect("fallback hit merged");
    assert_eq!(hit.article, "ST-15208AA100");
    assert!(hit.is_cross);
    assert!(!hit.is_original);
    assert!(!hit.is_requested);
}

#[tokio::test]
async fn test_fallback_skipped_when_primary_has_offers() {
    let autotrade = Arc::new(
        FakeSupplier::new(Provider::Autotrade)
            .returning(vec![offer(Provider::Autotrade, "OC90", "MAHLE", "400", 1)]),
    );
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).returning(vec![offer(
        Provider::Berg,
        "W712/75",
        "MANN",
        "350",
        2,
    )
    .with_cross(true)]));

    let engine = engine(vec![autotrade.clone(), berg]);
    engine.search_offers(&SearchRequest::new("OC90")).await;

    assert_eq!(autotrade.calls(), vec!["OC90".to_string()]);
}

#[tokio::test]
async fn test_fallback_skipped_when_primary_not_registered() {
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).returning(Vec::new()));
    let rossko = Arc::new(FakeSupplier::new(Provider::Rossko).returning(vec![offer(
        Provider::Rossko,
        "W712/75",
        "MANN",
        "350",
        2,
    )]));

    let engine = engine(vec![berg.clone(), rossko]);
    let offers = engine.search_offers(&SearchRequest::new("OC90")).await;

    assert_eq!(offers.len(), 1);
    assert_eq!(berg.calls().len(), 1);
}

#[tokio::test]
async fn test_markup_and_rounding() {
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).returning(vec![
        offer(Provider::Berg, "OC90", "MAHLE", "410.20", 1),
        offer(Provider::Berg, "OC90", "KNECHT", "99.99", 4),
    ]));

    let engine = engine(vec![berg]);
    let request = SearchRequest::new("OC90")
        .with_markup(dec("15"))
        .with_sort(SortBy::PriceAsc);
    let offers = engine.search_offers(&request).await;

    let prices: Vec<_> = offers.iter().map(|o| o.price).collect();
    assert_eq!(prices, vec![dec("115"), dec("472")]);
}

#[tokio::test]
async fn test_in_stock_primary_filter() {
    let berg = Arc::new(FakeSupplier::new(Provider::Berg).returning(vec![
        offer(Provider::Berg, "OC90", "MAHLE", "410", 1).with_warehouse("Тюмень, Пермякова"),
        offer(Provider::Berg, "OC90", "MAHLE", "390", 0),
        offer(Provider::Berg, "OC90", "MAHLE", "420", 3).with_warehouse("Тюмень 2"),
    ]));

    let engine = engine(vec![berg]);
    let request = SearchRequest::new("OC90").with_filter(AvailabilityFilter::InStockPrimary);
    let offers = engine.search_offers(&request).await;

    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].warehouse, "Тюмень, Пермякова");
}

#[tokio::test]
async fn test_negative_markup_is_clamped() {
    let berg = Arc::new(
        FakeSupplier::new(Provider::Berg)
            .returning(vec![offer(Provider::Berg, "OC90", "MAHLE", "410.2", 1)]),
    );

    let engine = engine(vec![berg]);
    let offers = engine
        .search_offers(&SearchRequest::new("OC90").with_markup(dec("-20")))
        .await;

    assert_eq!(offers[0].price, dec("411"));
}

#[tokio::test]
async fn test_empty_article_is_empty_result() {
    let berg = Arc::new(
        FakeSupplier::new(Provider::Berg)
            .returning(vec![offer(Provider::Berg, "OC90", "MAHLE", "1", 1)]),
    );

    let engine = engine(vec![berg.clone()]);
    assert!(engine.search_offers(&SearchRequest::new("   ")).await.is_empty());
    assert!(berg.calls().is_empty());
}

#[tokio::test]
async fn test_huge_markup_is_rejected_without_panic() {
    let berg = Arc::new(
        FakeSupplier::new(Provider::Berg)
            .returning(vec![offer(Provider::Berg, "OC90", "MAHLE", "410.2", 1)]),
    );

    let engine = engine(vec![berg.clone()]);
    let request = SearchRequest::new("OC90").with_markup(dec("100000000000000000000000000"));
    assert!(engine.search_offers(&request).await.is_empty());
    assert!(berg.calls().is_empty());
}
