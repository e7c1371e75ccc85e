//! Common test utilities

use async_trait::async_trait;
use partscout::models::{Offer, Provider};
use partscout::suppliers::{FetchOptions, SupplierClient, SupplierError};
use partscout::utils::error::FetchError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Parse a decimal literal
#[allow(dead_code)]
pub fn dec(v: &str) -> Decimal {
    v.parse().unwrap()
}

/// Create an offer with the fields the pipeline looks at
#[allow(dead_code)]
pub fn offer(provider: Provider, article: &str, brand: &str, price: &str, days: u32) -> Offer {
    Offer::new(provider, article, brand, dec(price))
        .with_delivery(days)
        .with_quantity(1)
        .with_warehouse("Москва")
}

/// Scripted supplier: fixed answers per article, optional failure and delay
#[allow(dead_code)]
pub struct FakeSupplier {
    provider: Provider,
    answers: HashMap<String, Vec<Offer>>,
    default_answer: Vec<Offer>,
    fail: bool,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeSupplier {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            answers: HashMap::new(),
            default_answer: Vec::new(),
            fail: false,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer every query with these offers
    pub fn returning(mut self, offers: Vec<Offer>) -> Self {
        self.default_answer = offers;
        self
    }

    /// Answer one specific article code with these offers
    pub fn answering(mut self, article: &str, offers: Vec<Offer>) -> Self {
        self.answers.insert(article.to_string(), offers);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Articles this supplier was asked for, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SupplierClient for FakeSupplier {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch(
        &self,
        article: &str,
        _brand: Option<&str>,
        _opts: &FetchOptions,
    ) -> Result<Vec<Offer>, SupplierError> {
        self.calls.lock().unwrap().push(article.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SupplierError::fetch(self.provider, FetchError::ServerError(503)));
        }

        Ok(self
            .answers
            .get(article)
            .cloned()
            .unwrap_or_else(|| self.default_answer.clone()))
    }
}

/// Wrap an inner XML document the way the Autostels service returns it
#[allow(dead_code)]
pub fn autostels_envelope(method: &str, inner: &str) -> String {
    let escaped = inner
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><{method}Response xmlns="http://tempuri.org/"><{method}Result>{escaped}</{method}Result></{method}Response></s:Body></s:Envelope>"#
    )
}
