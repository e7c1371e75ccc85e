use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::PathBuf;

use partscout::config::Config;
use partscout::models::{AvailabilityFilter, SearchRequest, SortBy};
use partscout::search::SearchEngine;
use partscout::utils::truncate_text;

/// Arguments of the `search` command
pub struct SearchParams {
    pub article: String,
    pub brand: Option<String>,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub markup: f64,
    pub config: Option<PathBuf>,
    pub json: bool,
}

pub async fn search(params: SearchParams) -> Result<()> {
    let config = Config::load(params.config.as_deref()).context("Failed to load configuration")?;

    let markup = Decimal::try_from(params.markup).context("Invalid markup percent")?;
    let mut request = SearchRequest::new(params.article.clone())
        .with_filter(AvailabilityFilter::parse(params.filter.as_deref().unwrap_or_default()))
        .with_sort(SortBy::parse(params.sort.as_deref().unwrap_or_default()))
        .with_markup(markup);
    if let Some(brand) = params.brand {
        request = request.with_brand(brand);
    }

    if let Err(reason) = request.validate() {
        anyhow::bail!("Invalid search request: {reason}");
    }

    let engine = SearchEngine::from_config(&config).await;
    let offers = engine.search_offers(&request).await;

    if params.json {
        println!("{}", serde_json::to_string_pretty(&offers)?);
        return Ok(());
    }

    println!("Search results for \"{}\"", request.article);
    println!("================================");

    if offers.is_empty() {
        println!("\nNo offers found");
        return Ok(());
    }

    println!(
        "\n{:<4} {:<20} {:<14} {:>10} {:>6} {:>5}  {:<10} {}",
        "#", "Article", "Brand", "Price", "Qty", "Days", "Provider", "Warehouse"
    );
    for (i, offer) in offers.iter().enumerate() {
        let marker = if offer.is_cross { "~" } else { " " };
        println!(
            "{:<4} {:<20} {:<14} {:>10} {:>6} {:>5}  {:<10} {}{}",
            i + 1,
            truncate_text(&offer.article, 20),
            truncate_text(&offer.brand, 14),
            offer.price,
            offer.quantity,
            offer.delivery_days,
            offer.provider,
            marker,
            truncate_text(&offer.warehouse, 40),
        );
    }
    println!("\n{} offers (~ marks analogs)", offers.len());

    Ok(())
}
