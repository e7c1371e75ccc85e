//! Shared HTTP plumbing for supplier adapters
//!
//! One [`HttpTransport`] per adapter. It owns a configured reqwest client,
//! maps status codes and timeouts into [`FetchError`], and knows the three
//! request shapes suppliers use: SOAP POST, form POST and GET with a query.
//! There is no retry loop; a failed call is an empty result upstream.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::time::Duration;

use crate::utils::error::FetchError;
use crate::utils::truncate_text;

/// Response body with the content type the server declared
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub content_type: String,
    pub body: String,
}

impl TransportResponse {
    /// Whether the server claims to have sent XML or SOAP
    pub fn is_xml(&self) -> bool {
        let ct = self.content_type.to_lowercase();
        ct.contains("xml") || ct.contains("soap")
    }
}

/// HTTP client wrapper used by all adapters
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .gzip(true)
            .cookie_store(true)
            .user_agent(format!("partscout/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// POST a SOAP envelope
    pub async fn post_soap(
        &self,
        url: &str,
        soap_action: &str,
        envelope: String,
    ) -> Result<TransportResponse, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/xml; charset=utf-8"),
        );
        let action = HeaderValue::from_str(soap_action)
            .map_err(|_| FetchError::InvalidUrl(format!("invalid SOAPAction: {soap_action}")))?;
        headers.insert("SOAPAction", action);

        let response = self
            .client
            .post(Self::checked_url(url)?)
            .headers(headers)
            .body(envelope)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        Self::read(response).await
    }

    /// POST url-encoded form fields
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, String)],
    ) -> Result<TransportResponse, FetchError> {
        let response = self
            .client
            .post(Self::checked_url(url)?)
            .header(ACCEPT, "application/json")
            .form(fields)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        Self::read(response).await
    }

    /// GET with query parameters
    pub async fn get_query(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<TransportResponse, FetchError> {
        let response = self
            .client
            .get(Self::checked_url(url)?)
            .header(ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        Self::read(response).await
    }

    fn checked_url(url: &str) -> Result<url::Url, FetchError> {
        url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))
    }

    async fn read(response: Response) -> Result<TransportResponse, FetchError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() {
            if let Ok(body) = response.text().await {
                tracing::debug!(
                    status = status.as_u16(),
                    body = %truncate_text(&body, 500),
                    "Supplier returned error status"
                );
            }
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let body = response.text().await.map_err(FetchError::from_reqwest)?;
        Ok(TransportResponse { content_type, body })
    }
}

/// Escape text for inclusion in an XML element or attribute
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
