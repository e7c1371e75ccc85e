// Core data structures for partscout

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::normalize_article;

/// Supplier that produced an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Rossko,
    Autotrade,
    Berg,
    Autostels,
}

impl Provider {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rossko => "rossko",
            Self::Autotrade => "autotrade",
            Self::Berg => "berg",
            Self::Autostels => "autostels",
        }
    }

    /// Create from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rossko" => Some(Self::Rossko),
            "autotrade" => Some(Self::Autotrade),
            "berg" => Some(Self::Berg),
            "autostels" => Some(Self::Autostels),
            _ => None,
        }
    }

    /// Get all providers in default registration order
    pub fn all() -> Vec<Self> {
        vec![Self::Rossko, Self::Autotrade, Self::Berg, Self::Autostels]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sellable proposition for a part from one supplier warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    /// Article code exactly as the supplier sent it
    pub article: String,
    pub brand: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    /// 0 means same day / in stock
    pub delivery_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_days_max: Option<u32>,
    #[serde(default)]
    pub warehouse: String,
    #[serde(default)]
    pub is_cross: bool,
    #[serde(default)]
    pub in_stock: bool,
    pub provider: Provider,

    /// Price already includes the request markup
    #[serde(default)]
    pub markup_applied: bool,
    /// Placeholder produced by an adapter rather than by a supplier response
    #[serde(default)]
    pub synthetic: bool,

    // Set by the aggregation pipeline
    #[serde(default)]
    pub is_original: bool,
    #[serde(default)]
    pub is_requested: bool,
}

impl Offer {
    /// Create an offer with the mandatory fields, everything else defaulted
    pub fn new(
        provider: Provider,
        article: impl Into<String>,
        brand: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            article: article.into(),
            brand: brand.into(),
            name: String::new(),
            price,
            quantity: 0,
            delivery_days: 0,
            delivery_days_max: None,
            warehouse: String::new(),
            is_cross: false,
            in_stock: false,
            provider,
            markup_applied: false,
            synthetic: false,
            is_original: false,
            is_requested: false,
        }
    }

    /// Article in comparison form
    pub fn normalized_article(&self) -> String {
        normalize_article(&self.article)
    }

    /// Brand in grouping form
    pub fn brand_key(&self) -> String {
        self.brand.trim().to_uppercase()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_delivery(mut self, days: u32) -> Self {
        self.delivery_days = days;
        self
    }

    pub fn with_delivery_max(mut self, days: Option<u32>) -> Self {
        self.delivery_days_max = days;
        self
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = warehouse.into();
        self
    }

    pub fn with_cross(mut self, is_cross: bool) -> Self {
        self.is_cross = is_cross;
        self
    }

    pub fn with_in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = in_stock;
        self
    }
}

/// Availability filter requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum AvailabilityFilter {
    #[default]
    None,
    /// Home-region warehouses with delivery within one day
    InStockPrimary,
    /// Everything that has to be ordered (more than one day)
    OnOrder,
}

impl AvailabilityFilter {
    /// Parse a client value; anything unrecognized means no filter
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "in_stock_primary" | "in_stock_tyumen" | "in_stock" | "instockprimary" => {
                Self::InStockPrimary
            }
            "on_order" | "onorder" => Self::OnOrder,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::InStockPrimary => "in_stock_primary",
            Self::OnOrder => "on_order",
        }
    }
}

impl From<Option<String>> for AvailabilityFilter {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl From<AvailabilityFilter> for String {
    fn from(value: AvailabilityFilter) -> Self {
        value.as_str().to_string()
    }
}

/// Secondary sort order applied inside each priority tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum SortBy {
    #[default]
    None,
    PriceAsc,
    PriceDesc,
    DeliveryAsc,
}

impl SortBy {
    /// Parse a client value; anything unrecognized means default ordering
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "price_asc" | "priceasc" => Self::PriceAsc,
            "price_desc" | "pricedesc" => Self::PriceDesc,
            "delivery_asc" | "deliveryasc" => Self::DeliveryAsc,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::DeliveryAsc => "delivery_asc",
        }
    }
}

impl From<Option<String>> for SortBy {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Self::parse).unwrap_or_default()
    }
}

impl From<SortBy> for String {
    fn from(value: SortBy) -> Self {
        value.as_str().to_string()
    }
}

/// Largest markup accepted from clients, in percent
pub const MAX_MARKUP_PERCENT: i64 = 1000;

/// One search query from the request layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub article: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default)]
    pub availability_filter: AvailabilityFilter,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub markup_percent: Decimal,
}

impl SearchRequest {
    /// Create a request for an article with default options
    pub fn new(article: impl Into<String>) -> Self {
        Self {
            article: article.into(),
            brand: None,
            availability_filter: AvailabilityFilter::None,
            sort_by: SortBy::None,
            markup_percent: Decimal::ZERO,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        let brand = brand.into();
        self.brand = (!brand.trim().is_empty()).then_some(brand);
        self
    }

    pub fn with_filter(mut self, filter: AvailabilityFilter) -> Self {
        self.availability_filter = filter;
        self
    }

    pub fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    pub fn with_markup(mut self, markup_percent: Decimal) -> Self {
        self.markup_percent = markup_percent;
        self
    }

    /// Check the request-level constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.article.trim().is_empty() {
            return Err("article must not be empty".to_string());
        }
        if normalize_article(&self.article).is_empty() {
            return Err("article contains only separators".to_string());
        }
        if self.markup_percent.is_sign_negative() && !self.markup_percent.is_zero() {
            return Err("markup_percent must be non-negative".to_string());
        }
        if self.markup_percent > Decimal::from(MAX_MARKUP_PERCENT) {
            return Err(format!("markup_percent must not exceed {MAX_MARKUP_PERCENT}"));
        }
        Ok(())
    }

    /// Brand filter, ignoring blank values
    pub fn brand_filter(&self) -> Option<&str> {
        self.brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }
}
