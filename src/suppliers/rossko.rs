//! Rossko SOAP adapter
//!
//! `GetSearch` returns parts, each with a list of warehouse stocks and an
//! optional `crosses` list of analog parts with their own stocks. Every stock
//! entry becomes one offer.
//!
//! Rossko prices are marked up here rather than in the pipeline, and offers
//! carry `markup_applied = true`. When the supplier yields nothing usable the
//! adapter can return a single synthetic placeholder offer instead of an empty
//! list (`placeholder_on_failure`).

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

use super::decode::{xml_child, xml_children, xml_find, xml_price, xml_str, xml_u32};
use super::transport::{escape_xml, HttpTransport};
use super::{AvailabilityPolicy, FetchOptions, SupplierClient, SupplierError};
use crate::config::RosskoConfig;
use crate::models::{Offer, Provider};
use crate::utils::apply_markup;
use crate::utils::error::ParseError;

const SOAP_ACTION: &str = "http://api.rossko.ru/GetSearch";

const PLACEHOLDER_BRAND: &str = "ОРИГИНАЛ";
const PLACEHOLDER_WAREHOUSE: &str = "ROSSKO (mock)";
const PLACEHOLDER_PRICE: i64 = 1500;
const PLACEHOLDER_DELIVERY_DAYS: u32 = 2;

/// Rossko API client
pub struct RosskoClient {
    config: RosskoConfig,
    transport: HttpTransport,
    policy: AvailabilityPolicy,
}

impl RosskoClient {
    /// Create a client with the same-day availability rule
    pub fn new(config: RosskoConfig) -> Result<Self, SupplierError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))
            .map_err(|e| SupplierError::fetch(Provider::Rossko, e))?;

        Ok(Self {
            config,
            transport,
            policy: AvailabilityPolicy::same_day(),
        })
    }

    /// Replace the availability rule
    pub fn with_policy(mut self, policy: AvailabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn envelope(&self, article: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
    <soap:Body>
        <GetSearch xmlns="http://api.rossko.ru/">
            <KEY1>{key1}</KEY1>
            <KEY2>{key2}</KEY2>
            <text>{text}</text>
            <delivery_id>{delivery_id}</delivery_id>
        </GetSearch>
    </soap:Body>
</soap:Envelope>"#,
            key1 = escape_xml(&self.config.key1),
            key2 = escape_xml(&self.config.key2),
            text = escape_xml(article),
            delivery_id = escape_xml(&self.config.delivery_id),
        )
    }

    async fn search(&self, article: &str, opts: &FetchOptions) -> Result<Vec<Offer>, SupplierError> {
        let response = self
            .transport
            .post_soap(&self.config.base_url, SOAP_ACTION, self.envelope(article))
            .await
            .map_err(|e| SupplierError::fetch(Provider::Rossko, e))?;

        if !response.is_xml() {
            return Err(SupplierError::parse(
                Provider::Rossko,
                ParseError::ContentType(response.content_type),
            ));
        }

        self.parse_response(&response.body, opts.markup_percent)
            .map_err(|e| SupplierError::parse(Provider::Rossko, e))
    }

    /// Decode a `GetSearch` response body into offers
    pub fn parse_response(&self, body: &str, markup_percent: Decimal) -> Result<Vec<Offer>, ParseError> {
        let doc = roxmltree::Document::parse(body)?;
        let result = xml_find(doc.root_element(), "SearchResult")
            .ok_or_else(|| ParseError::UnexpectedShape("missing SearchResult".to_string()))?;

        if xml_str(result, "success") != "true" {
            let message = xml_str(result, "message");
            return Err(ParseError::Supplier(if message.is_empty() {
                "unknown error".to_string()
            } else {
                message
            }));
        }

        let mut offers = Vec::new();
        let Some(parts) = xml_child(result, "PartsList") else {
            return Ok(offers);
        };

        for part in xml_children(parts, "Part") {
            self.explode_part(part, false, markup_percent, &mut offers);

            if let Some(crosses) = xml_child(part, "crosses") {
                for cross in xml_children(crosses, "Part") {
                    self.explode_part(cross, true, markup_percent, &mut offers);
                }
            }
        }

        Ok(offers)
    }

    /// One offer per stock entry of a part
    fn explode_part(
        &self,
        part: roxmltree::Node<'_, '_>,
        is_cross: bool,
        markup_percent: Decimal,
        out: &mut Vec<Offer>,
    ) {
        let article = xml_str(part, "partnumber");
        let brand = xml_str(part, "brand");
        let name = xml_str(part, "name");

        let Some(stocks) = xml_child(part, "stocks") else {
            return;
        };

        for stock in xml_children(stocks, "stock") {
            let decoded = (|| -> Result<(Decimal, u32, u32), ParseError> {
                Ok((
                    xml_price(stock, "price")?,
                    xml_u32(stock, "count")?,
                    xml_u32(stock, "delivery")?,
                ))
            })();

            let (price, count, delivery) = match decoded {
                Ok(values) => values,
                Err(e) => {
                    tracing::debug!(article = %article, error = %e, "Dropping Rossko stock entry");
                    continue;
                }
            };

            let Some(price) = apply_markup(price, markup_percent) else {
                tracing::warn!(article = %article, price = %price, "Dropping Rossko stock entry, marked-up price overflows");
                continue;
            };

            let warehouse = self.warehouse_label(&xml_str(stock, "description"), delivery);
            let in_stock = self.policy.is_in_stock(&warehouse, delivery, count);

            let mut offer = Offer::new(Provider::Rossko, article.clone(), brand.clone(), price)
                .with_name(name.clone())
                .with_quantity(count)
                .with_delivery(delivery)
                .with_warehouse(warehouse)
                .with_cross(is_cross)
                .with_in_stock(in_stock);
            offer.markup_applied = true;

            out.push(offer);
        }
    }

    /// Partner warehouses with same-day delivery are shown as the home warehouse
    fn warehouse_label(&self, description: &str, delivery_days: u32) -> String {
        let marker = &self.config.partner_warehouse_marker;
        if delivery_days == 0 && !marker.is_empty() && description.contains(marker.as_str()) {
            self.config.home_warehouse_label.clone()
        } else {
            description.to_string()
        }
    }

    /// Synthetic offer returned when the supplier yields nothing usable
    pub fn placeholder(&self, article: &str) -> Offer {
        let mut offer = Offer::new(
            Provider::Rossko,
            article,
            PLACEHOLDER_BRAND,
            Decimal::from(PLACEHOLDER_PRICE),
        )
        .with_name(format!("Запчасть {article}"))
        .with_delivery(PLACEHOLDER_DELIVERY_DAYS)
        .with_warehouse(PLACEHOLDER_WAREHOUSE);
        offer.in_stock = self.policy.is_in_stock(PLACEHOLDER_WAREHOUSE, PLACEHOLDER_DELIVERY_DAYS, 0);
        offer.synthetic = true;
        offer
    }
}

#[async_trait]
impl SupplierClient for RosskoClient {
    fn provider(&self) -> Provider {
        Provider::Rossko
    }

    async fn fetch(
        &self,
        article: &str,
        _brand: Option<&str>,
        opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError> {
        if self.config.key1.is_empty() || self.config.key2.is_empty() {
            return Err(SupplierError::not_configured(
                Provider::Rossko,
                "KEY1 and KEY2 are required",
            ));
        }

        tracing::info!(article = %article, "Searching Rossko");

        match self.search(article, opts).await {
            Ok(offers) if !offers.is_empty() => {
                tracing::info!(article = %article, count = offers.len(), "Rossko returned offers");
                Ok(offers)
            }
            Ok(_) if self.config.placeholder_on_failure => {
                tracing::warn!(article = %article, "No Rossko offers, returning placeholder");
                Ok(vec![self.placeholder(article)])
            }
            Ok(offers) => Ok(offers),
            Err(e) if self.config.placeholder_on_failure => {
                tracing::warn!(article = %article, error = %e, "Rossko failed, returning placeholder");
                Ok(vec![self.placeholder(article)])
            }
            Err(e) => Err(e),
        }
    }
}
