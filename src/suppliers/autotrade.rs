//! Autotrade JSON adapter
//!
//! Requests are a form POST whose single `data` field carries a JSON command
//! (`getItemsByQuery`). Each item has one price and a map of warehouse
//! stocks; every warehouse with something on hand becomes one offer.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;

use super::decode::{json_price, json_str, json_u32};
use super::transport::HttpTransport;
use super::{AvailabilityPolicy, FetchOptions, SupplierClient, SupplierError};
use crate::config::AutotradeConfig;
use crate::models::{Offer, Provider};
use crate::utils::error::ParseError;
use crate::utils::normalize_article;

const DEFAULT_HOME_REGION: &str = "тюмень";
const UNKNOWN_WAREHOUSE: &str = "Неизвестно";

/// Derive the API auth key
///
/// A configured key that already looks like an MD5 digest is used as-is;
/// otherwise the key is `md5(login + md5(password) + salt)`.
pub fn auth_key(config: &AutotradeConfig) -> String {
    let key = config.api_key.trim();
    if key.len() == 32 && key.chars().all(|c| c.is_ascii_hexdigit()) {
        return key.to_string();
    }

    let password_hash = format!("{:x}", md5::compute(config.password.as_bytes()));
    let combined = format!("{}{}{}", config.login, password_hash, config.salt);
    format!("{:x}", md5::compute(combined.as_bytes()))
}

/// Autotrade API client
pub struct AutotradeClient {
    config: AutotradeConfig,
    transport: HttpTransport,
    policy: AvailabilityPolicy,
    auth_key: String,
}

impl AutotradeClient {
    /// Create a client with the home-region availability rule
    pub fn new(config: AutotradeConfig) -> Result<Self, SupplierError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))
            .map_err(|e| SupplierError::fetch(Provider::Autotrade, e))?;
        let auth_key = auth_key(&config);

        Ok(Self {
            config,
            transport,
            policy: AvailabilityPolicy::home_region(DEFAULT_HOME_REGION),
            auth_key,
        })
    }

    /// Replace the availability rule
    pub fn with_policy(mut self, policy: AvailabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn request_payload(&self, article: &str) -> Value {
        json!({
            "auth_key": self.auth_key,
            "method": "getItemsByQuery",
            "params": {
                "q": article,
                "strict": u8::from(self.config.strict),
                "page": 1,
                "limit": self.config.limit,
                "cross": u8::from(self.config.cross),
                "replace": u8::from(self.config.replace),
                "with_stocks_and_prices": 1,
                "with_delivery": 1,
            }
        })
    }

    /// Decode a `getItemsByQuery` response body into offers
    pub fn parse_response(&self, body: &str, query: &str) -> Result<Vec<Offer>, ParseError> {
        let root: Value = serde_json::from_str(body)?;

        let code = root.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != 0 {
            let message = json_str(&root, "message");
            return Err(ParseError::Supplier(format!("code {code}: {message}")));
        }

        let items = match root.get("items") {
            Some(Value::Array(items)) => items.as_slice(),
            Some(Value::Object(_)) => {
                return Err(ParseError::UnexpectedShape("items is an object".to_string()))
            }
            _ => &[],
        };

        let normalized_query = normalize_article(query);
        let mut offers = Vec::new();

        for item in items {
            let article = json_str(item, "article");
            let brand = json_str(item, "brand_name");
            if article.is_empty() || brand.is_empty() {
                continue;
            }

            let normalized = normalize_article(&article);
            if self.config.strict && normalized != normalized_query {
                tracing::debug!(article = %article, "Skipping non-matching Autotrade item");
                continue;
            }

            let price = match json_price(item, "price") {
                Ok(price) => price,
                Err(e) => {
                    tracing::debug!(article = %article, error = %e, "Dropping Autotrade item");
                    continue;
                }
            };

            let is_cross = normalized != normalized_query;
            let name = json_str(item, "name");

            for stock in stock_entries(item) {
                match self.stock_offer(stock, &article, &brand, &name, price, is_cross) {
                    Ok(Some(offer)) => offers.push(offer),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(article = %article, error = %e, "Dropping Autotrade stock entry");
                    }
                }
            }
        }

        Ok(offers)
    }

    fn stock_offer(
        &self,
        stock: &Value,
        article: &str,
        brand: &str,
        name: &str,
        price: Decimal,
        is_cross: bool,
    ) -> Result<Option<Offer>, ParseError> {
        let quantity = json_u32(stock, "quantity_unpacked")?
            .saturating_add(json_u32(stock, "quantity_packed")?);
        if quantity == 0 {
            return Ok(None);
        }

        let delivery_days = json_u32(stock, "delivery_period")?;
        let mut warehouse = json_str(stock, "name");
        if warehouse.is_empty() {
            warehouse = UNKNOWN_WAREHOUSE.to_string();
        }
        let in_stock = self.policy.is_in_stock(&warehouse, delivery_days, quantity);

        Ok(Some(
            Offer::new(Provider::Autotrade, article, brand, price)
                .with_name(name)
                .with_quantity(quantity)
                .with_delivery(delivery_days)
                .with_warehouse(warehouse)
                .with_cross(is_cross)
                .with_in_stock(in_stock),
        ))
    }
}

/// Warehouse stock entries of an item; `stocks` is a map or an empty array
fn stock_entries(item: &Value) -> Vec<&Value> {
    match item.get("stocks") {
        Some(Value::Object(map)) => map.values().collect(),
        Some(Value::Array(list)) => list.iter().collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl SupplierClient for AutotradeClient {
    fn provider(&self) -> Provider {
        Provider::Autotrade
    }

    async fn fetch(
        &self,
        article: &str,
        _brand: Option<&str>,
        _opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError> {
        if self.config.api_key.trim().is_empty() && self.config.login.is_empty() {
            return Err(SupplierError::not_configured(
                Provider::Autotrade,
                "api key or login is required",
            ));
        }

        tracing::info!(article = %article, strict = self.config.strict, "Searching Autotrade");

        let payload = self.request_payload(article).to_string();
        let response = self
            .transport
            .post_form(&self.config.base_url, &[("data", payload)])
            .await
            .map_err(|e| SupplierError::fetch(Provider::Autotrade, e))?;

        let offers = self
            .parse_response(&response.body, article)
            .map_err(|e| SupplierError::parse(Provider::Autotrade, e))?;

        tracing::info!(article = %article, count = offers.len(), "Autotrade returned offers");
        Ok(offers)
    }
}
