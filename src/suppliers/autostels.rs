//! Autostels two-step SOAP adapter
//!
//! Step 1 resolves an article to brand candidates (`ProductID`,
//! `ProducerName`); step 2 fetches offers for one candidate. When the brand
//! is already known the joint search does both at once. Parameters travel as
//! an inner XML document in a CDATA section, and results come back the same
//! way.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::join_all;
use std::time::Duration;

use super::decode::{xml_find, xml_flag, xml_price, xml_str, xml_text, xml_u32};
use super::transport::{escape_xml, HttpTransport};
use super::{AvailabilityPolicy, FetchOptions, SupplierClient, SupplierError};
use crate::config::AutostelsConfig;
use crate::models::{Offer, Provider};
use crate::utils::error::ParseError;

const SOAP_ACTION_BASE: &str = "http://tempuri.org/IAS2CSearch";
const DEFAULT_WAREHOUSE: &str = "Autostels";

/// Brand candidate resolved by step 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandCandidate {
    pub product_id: String,
    pub producer_name: String,
    pub stocks_only: bool,
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Step1,
    Step2,
    Joint,
}

impl Method {
    fn name(self) -> &'static str {
        match self {
            Self::Step1 => "SearchOfferStep1",
            Self::Step2 => "SearchOfferStep2",
            Self::Joint => "SearchOfferJoint",
        }
    }
}

/// Autostels API client
pub struct AutostelsClient {
    config: AutostelsConfig,
    transport: HttpTransport,
    policy: AvailabilityPolicy,
}

impl AutostelsClient {
    /// Create a client that trusts the supplier's availability flag
    pub fn new(config: AutostelsConfig) -> Result<Self, SupplierError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))
            .map_err(|e| SupplierError::fetch(Provider::Autostels, e))?;

        Ok(Self {
            config,
            transport,
            policy: AvailabilityPolicy::always(),
        })
    }

    /// Replace the availability rule
    pub fn with_policy(mut self, policy: AvailabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn session_info(&self) -> String {
        format!(
            r#"<SessionInfo ParentID="{}" UserLogin="{}" UserPass="{}" />"#,
            escape_xml(&self.config.parent_id),
            BASE64.encode(self.config.login.as_bytes()),
            BASE64.encode(self.config.password.as_bytes()),
        )
    }

    fn search_filters(&self) -> String {
        format!(
            "<StocksOnly>0</StocksOnly>\n    <InStock>0</InStock>\n    <ShowCross>{}</ShowCross>\n    <PeriodMin>-1</PeriodMin>\n    <PeriodMax>-1</PeriodMax>",
            u8::from(self.config.show_cross)
        )
    }

    fn step1_params(&self, article: &str) -> String {
        format!(
            "<root>\n  {}\n  <Search>\n    <Key>{}</Key>\n  </Search>\n</root>",
            self.session_info(),
            escape_xml(article)
        )
    }

    fn step2_params(&self, candidate: &BrandCandidate) -> String {
        format!(
            "<root>\n  {}\n  <Search ResultFilter=\"0\">\n    <ProductID>{}</ProductID>\n    <StocksOnly>{}</StocksOnly>\n    <InStock>0</InStock>\n    <ShowCross>{}</ShowCross>\n    <PeriodMin>-1</PeriodMin>\n    <PeriodMax>-1</PeriodMax>\n  </Search>\n</root>",
            self.session_info(),
            escape_xml(&candidate.product_id),
            u8::from(candidate.stocks_only),
            u8::from(self.config.show_cross)
        )
    }

    fn joint_params(&self, article: &str, producer: &str) -> String {
        format!(
            "<root>\n  {}\n  <Search ResultFilter=\"0\">\n    <ProductCode>{}</ProductCode>\n    <ProducerName>{}</ProducerName>\n    {}\n  </Search>\n</root>",
            self.session_info(),
            escape_xml(article),
            escape_xml(producer),
            self.search_filters()
        )
    }

    fn envelope(method: Method, params: &str) -> String {
        format!(
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:tem="http://tempuri.org/">
  <soapenv:Header/>
  <soapenv:Body>
    <tem:{method}>
      <tem:SearchParametersXml><![CDATA[{params}]]></tem:SearchParametersXml>
    </tem:{method}>
  </soapenv:Body>
</soapenv:Envelope>"#,
            method = method.name(),
            params = params.replace("]]>", "]]]]><![CDATA[>"),
        )
    }

    /// Send one SOAP call and return the inner result document text
    async fn call(&self, method: Method, params: String) -> Result<String, SupplierError> {
        let action = format!("{SOAP_ACTION_BASE}/{}", method.name());
        let response = self
            .transport
            .post_soap(&self.config.base_url, &action, Self::envelope(method, &params))
            .await
            .map_err(|e| SupplierError::fetch(Provider::Autostels, e))?;

        extract_result(&response.body, method.name())
            .map_err(|e| SupplierError::parse(Provider::Autostels, e))
    }

    async fn step1(&self, article: &str) -> Result<Vec<BrandCandidate>, SupplierError> {
        let inner = self.call(Method::Step1, self.step1_params(article)).await?;
        parse_candidates(&inner).map_err(|e| SupplierError::parse(Provider::Autostels, e))
    }

    async fn step2(&self, candidate: &BrandCandidate) -> Result<Vec<Offer>, SupplierError> {
        let inner = self.call(Method::Step2, self.step2_params(candidate)).await?;
        self.parse_offers(&inner)
            .map_err(|e| SupplierError::parse(Provider::Autostels, e))
    }

    async fn joint(&self, article: &str, producer: &str) -> Result<Vec<Offer>, SupplierError> {
        let inner = self
            .call(Method::Joint, self.joint_params(article, producer))
            .await?;
        self.parse_offers(&inner)
            .map_err(|e| SupplierError::parse(Provider::Autostels, e))
    }

    /// Decode offer rows from an inner result document
    pub fn parse_offers(&self, inner: &str) -> Result<Vec<Offer>, ParseError> {
        if inner.trim().is_empty() {
            return Ok(Vec::new());
        }
        let doc = roxmltree::Document::parse(inner)?;

        let offers = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "row")
            .filter_map(|row| match self.decode_row(row) {
                Ok(offer) => Some(offer),
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping Autostels row");
                    None
                }
            })
            .collect();

        Ok(offers)
    }

    fn decode_row(&self, row: roxmltree::Node<'_, '_>) -> Result<Offer, ParseError> {
        let price = xml_price(row, "Price")?;
        let quantity = xml_u32(row, "Quantity")?;
        let delivery_days = xml_u32(row, "PeriodMin")?;
        let delivery_max = xml_u32(row, "PeriodMax")?;
        let is_cross = xml_flag(row, "IsCross")?;
        let available = xml_flag(row, "IsAvailability")?;

        let mut warehouse = xml_str(row, "OfferName");
        if warehouse.is_empty() {
            warehouse = DEFAULT_WAREHOUSE.to_string();
        }
        let in_stock = available && self.policy.is_in_stock(&warehouse, delivery_days, quantity);

        Ok(Offer::new(
            Provider::Autostels,
            xml_str(row, "CodeAsIs"),
            xml_str(row, "ManufacturerName"),
            price,
        )
        .with_name(xml_str(row, "ProductName"))
        .with_quantity(quantity)
        .with_delivery(delivery_days)
        .with_delivery_max((delivery_max > 0).then_some(delivery_max))
        .with_warehouse(warehouse)
        .with_cross(is_cross)
        .with_in_stock(in_stock))
    }
}

/// Pull the inner document out of `<{method}Result>`
///
/// A missing or empty result element means "no data", not an error.
pub fn extract_result(body: &str, method: &str) -> Result<String, ParseError> {
    let doc = roxmltree::Document::parse(body)?;
    let result_name = format!("{method}Result");

    Ok(xml_find(doc.root_element(), &result_name)
        .map(xml_text)
        .unwrap_or_default())
}

/// Decode step-1 brand candidates, skipping incomplete rows
pub fn parse_candidates(inner: &str) -> Result<Vec<BrandCandidate>, ParseError> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let doc = roxmltree::Document::parse(inner)?;

    Ok(doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "row")
        .filter_map(|row| {
            let product_id = xml_str(row, "ProductID");
            let producer_name = xml_str(row, "ProducerName");
            if product_id.is_empty() || producer_name.is_empty() {
                return None;
            }
            let stocks_only = xml_flag(row, "StocksOnly").unwrap_or(false);
            Some(BrandCandidate {
                product_id,
                producer_name,
                stocks_only,
            })
        })
        .collect())
}

#[async_trait]
impl SupplierClient for AutostelsClient {
    fn provider(&self) -> Provider {
        Provider::Autostels
    }

    async fn fetch(
        &self,
        article: &str,
        brand: Option<&str>,
        _opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError> {
        if self.config.parent_id.is_empty() || self.config.login.is_empty() {
            return Err(SupplierError::not_configured(
                Provider::Autostels,
                "parent id and login are required",
            ));
        }

        tracing::info!(article = %article, brand = ?brand, "Searching Autostels");

        if let Some(brand) = brand {
            return self.joint(article, brand).await;
        }

        let candidates = self.step1(article).await?;
        if candidates.is_empty() {
            tracing::info!(article = %article, "No Autostels brand candidates, trying joint search");
            return self.joint(article, "").await;
        }

        let candidates: Vec<BrandCandidate> = candidates
            .into_iter()
            .take(self.config.max_step2_candidates)
            .collect();

        let results = join_all(candidates.iter().map(|c| self.step2(c))).await;

        let offers: Vec<Offer> = results
            .into_iter()
            .zip(&candidates)
            .flat_map(|(result, candidate)| match result {
                Ok(offers) => offers,
                Err(e) => {
                    tracing::warn!(
                        article = %article,
                        producer = %candidate.producer_name,
                        error = %e,
                        "Autostels step 2 failed"
                    );
                    Vec::new()
                }
            })
            .collect();

        tracing::info!(article = %article, count = offers.len(), "Autostels returned offers");
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AutostelsClient {
        AutostelsClient::new(AutostelsConfig {
            parent_id: "39151".into(),
            login: "user@example.com".into(),
            password: "secret".into(),
            ..AutostelsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_session_info_encodes_credentials() {
        let info = client().session_info();
        assert!(info.contains(r#"ParentID="39151""#));
        assert!(info.contains(&format!(r#"UserLogin="{}""#, BASE64.encode("user@example.com"))));
        assert!(info.contains(&format!(r#"UserPass="{}""#, BASE64.encode("secret"))));
    }

    #[test]
    fn test_extract_escaped_inner_document() {
        let body = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><SearchOfferStep1Response xmlns="http://tempuri.org/"><SearchOfferStep1Result>&lt;root&gt;&lt;rows&gt;&lt;row&gt;&lt;ProductID&gt;77&lt;/ProductID&gt;&lt;ProducerName&gt;SAT&lt;/ProducerName&gt;&lt;/row&gt;&lt;/rows&gt;&lt;/root&gt;</SearchOfferStep1Result></SearchOfferStep1Response></s:Body></s:Envelope>"#;
        let inner = extract_result(body, "SearchOfferStep1").unwrap();
        let candidates = parse_candidates(&inner).unwrap();
        assert_eq!(
            candidates,
            vec![BrandCandidate {
                product_id: "77".into(),
                producer_name: "SAT".into(),
                stocks_only: false,
            }]
        );
    }

    #[test]
    fn test_missing_result_is_empty() {
        let body = r#"<Envelope><Body><Other/></Body></Envelope>"#;
        assert_eq!(extract_result(body, "SearchOfferStep2").unwrap(), "");
        assert!(client().parse_offers("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_offer_rows() {
        let inner = r#"<root><rows>
            <row><CodeAsIs>ST-15208-AA100</CodeAsIs><ManufacturerName>SAT</ManufacturerName><ProductName>Filter</ProductName><Price>121.00</Price><Quantity>5</Quantity><PeriodMin>1</PeriodMin><PeriodMax>3</PeriodMax><OfferName>Склад 1</OfferName><IsCross>1</IsCross><IsAvailability>1</IsAvailability></row>
            <row><CodeAsIs>15208AA100</CodeAsIs><ManufacturerName>SUBARU</ManufacturerName><Price>600</Price><Quantity>0</Quantity><PeriodMin>7</PeriodMin><IsCross>0</IsCross><IsAvailability>0</IsAvailability></row>
            <row><CodeAsIs>BROKEN</CodeAsIs><Price>-5</Price></row>
        </rows></root>"#;
        let offers = client().parse_offers(inner).unwrap();
        assert_eq!(offers.len(), 2);

        assert!(offers[0].is_cross);
        assert!(offers[0].in_stock);
        assert_eq!(offers[0].delivery_days_max, Some(3));
        assert_eq!(offers[0].warehouse, "Склад 1");

        assert!(!offers[1].in_stock);
        assert_eq!(offers[1].warehouse, "Autostels");
        assert_eq!(offers[1].delivery_days_max, None);
    }

    #[test]
    fn test_envelope_wraps_params_in_cdata() {
        let envelope = AutostelsClient::envelope(Method::Joint, "<root/>");
        assert!(envelope.contains("<tem:SearchOfferJoint>"));
        assert!(envelope.contains("<![CDATA[<root/>]]>"));
    }
}
