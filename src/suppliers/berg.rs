//! Berg REST adapter
//!
//! `GET /ordering/get_stock.json` returns resources (parts), each with a list
//! of warehouse offers. An article shared by several brands comes back with a
//! `WARN_ARTICLE_IS_AMBIGUOUS` warning; without a brand the adapter then asks
//! again once per surfaced brand and merges the answers.

use async_trait::async_trait;
use futures::future::join_all;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use super::decode::{json_array, json_price, json_str, json_u32};
use super::transport::HttpTransport;
use super::{AvailabilityPolicy, FetchOptions, SupplierClient, SupplierError};
use crate::config::BergConfig;
use crate::models::{Offer, Provider};
use crate::utils::error::ParseError;
use crate::utils::normalize_article;

const AMBIGUOUS_WARNING: &str = "WARN_ARTICLE_IS_AMBIGUOUS";
const NO_STOCK_WAREHOUSE: &str = "Нет в наличии";
const UNKNOWN: &str = "Неизвестно";

/// Decoded `get_stock.json` response
#[derive(Debug, Default)]
pub struct StockResponse {
    pub offers: Vec<Offer>,
    /// Brands surfaced by an ambiguous-article warning, in response order
    pub ambiguous_brands: Option<Vec<String>>,
}

/// Berg API client
pub struct BergClient {
    config: BergConfig,
    transport: HttpTransport,
    policy: AvailabilityPolicy,
}

impl BergClient {
    /// Create a client with the next-day availability rule
    pub fn new(config: BergConfig) -> Result<Self, SupplierError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))
            .map_err(|e| SupplierError::fetch(Provider::Berg, e))?;

        Ok(Self {
            config,
            transport,
            policy: AvailabilityPolicy::next_day(),
        })
    }

    /// Replace the availability rule
    pub fn with_policy(mut self, policy: AvailabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/ordering/get_stock.json",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn query_params(&self, api_key: &str, article: &str, brand: Option<&str>) -> Vec<(String, String)> {
        let mut params = vec![
            ("key".to_string(), api_key.to_string()),
            ("items[0][resource_article]".to_string(), article.to_string()),
        ];
        if let Some(brand) = brand {
            params.push(("items[0][brand_name]".to_string(), brand.to_string()));
        }
        params.push((
            "analogs".to_string(),
            u8::from(self.config.analogs).to_string(),
        ));
        for (idx, wh_type) in self.config.warehouse_types.iter().enumerate() {
            params.push((format!("warehouse_types[{idx}]"), wh_type.to_string()));
        }
        params
    }

    async fn request(
        &self,
        api_key: &str,
        article: &str,
        brand: Option<&str>,
        with_placeholders: bool,
    ) -> Result<StockResponse, SupplierError> {
        let response = self
            .transport
            .get_query(&self.endpoint(), &self.query_params(api_key, article, brand))
            .await
            .map_err(|e| SupplierError::fetch(Provider::Berg, e))?;

        self.parse_response(&response.body, article, with_placeholders)
            .map_err(|e| SupplierError::parse(Provider::Berg, e))
    }

    /// Decode a `get_stock.json` body
    ///
    /// With `with_placeholders`, a resource without offers yields one
    /// zero-priced, out-of-stock offer so the part is still visible.
    pub fn parse_response(
        &self,
        body: &str,
        query: &str,
        with_placeholders: bool,
    ) -> Result<StockResponse, ParseError> {
        let root: Value = serde_json::from_str(body)?;

        if let Some(error) = root.get("error").filter(|e| !e.is_null()) {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(ParseError::Supplier(message));
        }

        let resources = json_array(&root, "resources");

        let is_ambiguous = json_array(&root, "warnings")
            .iter()
            .any(|w| json_str(w, "code") == AMBIGUOUS_WARNING);

        if is_ambiguous {
            let mut seen = HashSet::new();
            let brands = resources
                .iter()
                .filter_map(|r| r.get("brand").map(|b| json_str(b, "name")))
                .filter(|name| !name.is_empty())
                .filter(|name| seen.insert(name.to_uppercase()))
                .collect();
            return Ok(StockResponse {
                offers: Vec::new(),
                ambiguous_brands: Some(brands),
            });
        }

        let normalized_query = normalize_article(query);
        let mut offers = Vec::new();

        for resource in resources {
            let article = json_str(resource, "article");
            if article.is_empty() {
                continue;
            }
            let brand = resource
                .get("brand")
                .map(|b| json_str(b, "name"))
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string());
            let name = json_str(resource, "name");
            let is_cross = normalize_article(&article) != normalized_query;

            let resource_offers = json_array(resource, "offers");
            if resource_offers.is_empty() {
                if with_placeholders {
                    offers.push(
                        Offer::new(Provider::Berg, article, brand, Decimal::ZERO)
                            .with_name(name)
                            .with_warehouse(NO_STOCK_WAREHOUSE)
                            .with_cross(is_cross),
                    );
                }
                continue;
            }

            for raw in resource_offers {
                match self.decode_offer(raw, &article, &brand, &name, is_cross) {
                    Ok(offer) => offers.push(offer),
                    Err(e) => {
                        tracing::debug!(article = %article, error = %e, "Dropping Berg offer");
                    }
                }
            }
        }

        Ok(StockResponse {
            offers,
            ambiguous_brands: None,
        })
    }

    fn decode_offer(
        &self,
        raw: &Value,
        article: &str,
        brand: &str,
        name: &str,
        is_cross: bool,
    ) -> Result<Offer, ParseError> {
        let price = json_price(raw, "price")?;
        let quantity = json_u32(raw, "quantity")?;
        let delivery_days = json_u32(raw, "average_period")?;
        let assured = json_u32(raw, "assured_period")?;

        let warehouse = raw
            .get("warehouse")
            .map(|w| json_str(w, "name"))
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());
        let in_stock = self.policy.is_in_stock(&warehouse, delivery_days, quantity);

        Ok(Offer::new(Provider::Berg, article, brand, price)
            .with_name(name)
            .with_quantity(quantity)
            .with_delivery(delivery_days)
            .with_delivery_max((assured > 0).then_some(assured))
            .with_warehouse(warehouse)
            .with_cross(is_cross)
            .with_in_stock(in_stock))
    }

    /// Re-query once per brand and merge, skipping brands that fail
    async fn requery_brands(&self, api_key: &str, article: &str, brands: Vec<String>) -> Vec<Offer> {
        let brands: Vec<String> = brands
            .into_iter()
            .take(self.config.max_brand_requeries)
            .collect();

        tracing::info!(article = %article, brands = brands.len(), "Berg article is ambiguous, re-querying per brand");

        let requests = brands
            .iter()
            .map(|brand| self.request(api_key, article, Some(brand.as_str()), false));

        join_all(requests)
            .await
            .into_iter()
            .zip(&brands)
            .flat_map(|(result, brand)| match result {
                Ok(response) => response.offers,
                Err(e) => {
                    tracing::warn!(article = %article, brand = %brand, error = %e, "Berg brand re-query failed");
                    Vec::new()
                }
            })
            .collect()
    }
}

#[async_trait]
impl SupplierClient for BergClient {
    fn provider(&self) -> Provider {
        Provider::Berg
    }

    async fn fetch(
        &self,
        article: &str,
        brand: Option<&str>,
        _opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(SupplierError::not_configured(Provider::Berg, "api key is required"));
        };

        tracing::info!(article = %article, brand = ?brand, "Searching Berg");

        let first = self.request(api_key, article, brand, true).await?;

        let offers = match (first.ambiguous_brands, brand) {
            (Some(brands), None) => self.requery_brands(api_key, article, brands).await,
            _ => first.offers,
        };

        tracing::info!(article = %article, count = offers.len(), "Berg returned offers");
        Ok(offers)
    }
}
