//! Configuration management for partscout
//!
//! Configuration comes either from environment variables ([`Config::from_env`])
//! or from a TOML file ([`Config::from_file`]). Every section has defaults, so
//! a file only needs the values that differ.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::models::Provider;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search engine behaviour
    pub search: SearchConfig,

    /// Rossko SOAP adapter
    pub rossko: RosskoConfig,

    /// Autotrade JSON adapter
    pub autotrade: AutotradeConfig,

    /// Berg REST adapter
    pub berg: BergConfig,

    /// Autostels two-step SOAP adapter
    pub autostels: AutostelsConfig,

    /// Rate limiter and cache in front of the adapters
    pub guards: GuardsConfig,

    /// HTTP API server
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Search engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-adapter deadline in seconds
    pub adapter_timeout_secs: u64,

    /// Adapters queried for each request, in registration order
    pub providers: Vec<Provider>,

    /// Supplier re-queried by the cross-reference fallback
    pub primary_provider: Provider,

    /// Enable the cross-reference fallback
    pub fallback_enabled: bool,

    /// Maximum candidate codes sent to the primary supplier (1..=5)
    pub fallback_max_candidates: usize,

    /// Maximum distinct articles mined from other suppliers
    pub fallback_max_articles: usize,

    /// Case-insensitive substring identifying home-region warehouses
    pub home_region_marker: String,
}

/// Rossko adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosskoConfig {
    pub base_url: String,
    pub key1: String,
    pub key2: String,
    pub delivery_id: String,
    pub timeout_secs: u64,

    /// Stock description substring marking a partner warehouse
    pub partner_warehouse_marker: String,

    /// Label used for partner warehouses with same-day delivery
    pub home_warehouse_label: String,

    /// Return a synthetic placeholder offer when the supplier yields nothing
    pub placeholder_on_failure: bool,
}

/// Autotrade adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotradeConfig {
    pub base_url: String,
    pub login: String,
    pub password: String,

    /// Precomputed auth key; used as-is when it is 32 hex characters
    pub api_key: String,
    pub salt: String,
    pub timeout_secs: u64,

    /// Keep only items whose normalized article equals the query
    pub strict: bool,
    pub cross: bool,
    pub replace: bool,
    pub limit: u32,
}

/// Berg adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BergConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub analogs: bool,

    /// Warehouse type filter (1 = branch, 2 = central, 3 = partner)
    pub warehouse_types: Vec<u8>,

    /// Maximum brands re-queried after an ambiguous-article warning
    pub max_brand_requeries: usize,
}

/// Autostels adapter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutostelsConfig {
    pub base_url: String,
    pub parent_id: String,
    pub login: String,
    pub password: String,
    pub timeout_secs: u64,

    /// Step-2 calls per request
    pub max_step2_candidates: usize,
    pub show_cross: bool,
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    None,
    File,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Ok(Self::None),
            "file" | "disk" => Ok(Self::File),
            "redis" => Ok(Self::Redis),
            other => anyhow::bail!("unknown cache backend: {other}"),
        }
    }
}

/// Guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardsConfig {
    pub rate_limit_enabled: bool,

    /// Requests allowed per provider within one window
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,

    pub cache_backend: CacheBackend,
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub redis_url: Option<String>,
}

/// HTTP API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,

    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            adapter_timeout_secs: 15,
            providers: Provider::all(),
            primary_provider: Provider::Autotrade,
            fallback_enabled: true,
            fallback_max_candidates: 3,
            fallback_max_articles: 20,
            home_region_marker: String::from("тюмень"),
        }
    }
}

impl Default for RosskoConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://api.rossko.ru/service/v2.1/GetSearch"),
            key1: String::new(),
            key2: String::new(),
            delivery_id: String::from("000000001"),
            timeout_secs: 10,
            partner_warehouse_marker: String::from("Партнерский склад"),
            home_warehouse_label: String::from("Тюмень, Пермякова, 1Б"),
            placeholder_on_failure: true,
        }
    }
}

impl Default for AutotradeConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api2.autotrade.su/?json"),
            login: String::new(),
            password: String::new(),
            api_key: String::new(),
            salt: String::from("1>6)/MI~{J"),
            timeout_secs: 10,
            strict: false,
            cross: true,
            replace: false,
            limit: 100,
        }
    }
}

impl Default for BergConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.berg.ru/v1.0"),
            api_key: None,
            timeout_secs: 10,
            analogs: true,
            warehouse_types: Vec::new(),
            max_brand_requeries: 5,
        }
    }
}

impl Default for AutostelsConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://services.allautoparts.ru/WebService2/SearchService.svc"),
            parent_id: String::new(),
            login: String::new(),
            password: String::new(),
            timeout_secs: 10,
            max_step2_candidates: 5,
            show_cross: true,
        }
    }
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            rate_limit_enabled: true,
            rate_limit_max_requests: 10,
            rate_limit_window_secs: 60,
            cache_backend: CacheBackend::None,
            cache_dir: std::env::temp_dir().join("partscout_cache"),
            cache_ttl_secs: 3600,
            redis_url: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: String::from("0.0.0.0:8001"),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse::<T>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).and_then(|v| match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Search
        let search = &mut config.search;
        if let Some(v) = env_parse("PARTSCOUT_ADAPTER_TIMEOUT") {
            search.adapter_timeout_secs = v;
        }
        if let Some(v) = env_string("PARTSCOUT_PROVIDERS") {
            search.providers = v
                .split(',')
                .filter(|p| !p.trim().is_empty())
                .map(|p| {
                    Provider::parse(p)
                        .with_context(|| format!("Unknown provider in PARTSCOUT_PROVIDERS: {p}"))
                })
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(v) = env_string("PARTSCOUT_PRIMARY_PROVIDER") {
            search.primary_provider = Provider::parse(&v)
                .with_context(|| format!("Unknown PARTSCOUT_PRIMARY_PROVIDER: {v}"))?;
        }
        if let Some(v) = env_bool("PARTSCOUT_FALLBACK_ENABLED") {
            search.fallback_enabled = v;
        }
        if let Some(v) = env_parse("PARTSCOUT_FALLBACK_MAX_CANDIDATES") {
            search.fallback_max_candidates = v;
        }
        if let Some(v) = env_string("PARTSCOUT_HOME_REGION") {
            search.home_region_marker = v;
        }

        // Rossko
        let rossko = &mut config.rossko;
        if let Some(v) = env_string("ROSSKO_API_URL") {
            rossko.base_url = v;
        }
        rossko.key1 = env_string("ROSSKO_API_KEY1").unwrap_or_default();
        rossko.key2 = env_string("ROSSKO_API_KEY2").unwrap_or_default();
        if let Some(v) = env_bool("ROSSKO_PLACEHOLDER_ON_FAILURE") {
            rossko.placeholder_on_failure = v;
        }

        // Autotrade
        let autotrade = &mut config.autotrade;
        if let Some(v) = env_string("AUTOTRADE_API_URL") {
            autotrade.base_url = v;
        }
        autotrade.login = env_string("AUTOTRADE_LOGIN").unwrap_or_default();
        autotrade.password = env_string("AUTOTRADE_PASSWORD").unwrap_or_default();
        autotrade.api_key = env_string("AUTOTRADE_API_KEY").unwrap_or_default();
        if let Some(v) = env_bool("AUTOTRADE_STRICT") {
            autotrade.strict = v;
        }

        // Berg
        let berg = &mut config.berg;
        if let Some(v) = env_string("BERG_API_URL") {
            berg.base_url = v;
        }
        berg.api_key = env_string("BERG_API_KEY");

        // Autostels
        let autostels = &mut config.autostels;
        if let Some(v) = env_string("AUTOSTELS_API_URL") {
            autostels.base_url = v;
        }
        autostels.parent_id = env_string("AUTOSTELS_PARENT_ID").unwrap_or_default();
        autostels.login = env_string("AUTOSTELS_LOGIN").unwrap_or_default();
        autostels.password = env_string("AUTOSTELS_PASSWORD").unwrap_or_default();

        // Guards
        let guards = &mut config.guards;
        if let Some(v) = env_bool("PARTSCOUT_RATE_LIMIT_ENABLED") {
            guards.rate_limit_enabled = v;
        }
        if let Some(v) = env_parse("PARTSCOUT_RATE_LIMIT_MAX_REQUESTS") {
            guards.rate_limit_max_requests = v;
        }
        if let Some(v) = env_parse("PARTSCOUT_RATE_LIMIT_WINDOW") {
            guards.rate_limit_window_secs = v;
        }
        if let Some(v) = env_string("PARTSCOUT_CACHE_BACKEND") {
            guards.cache_backend = v.parse()?;
        }
        if let Some(v) = env_string("PARTSCOUT_CACHE_DIR") {
            guards.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = env_parse("PARTSCOUT_CACHE_TTL") {
            guards.cache_ttl_secs = v;
        }
        guards.redis_url = env_string("REDIS_URL");

        // Server and logging
        if let Some(v) = env_string("PARTSCOUT_BIND") {
            config.server.bind = v;
        }
        if let Some(v) = env_string("PARTSCOUT_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = env_string("PARTSCOUT_LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from a file when given, otherwise from the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let search = &self.search;

        if search.adapter_timeout_secs == 0 {
            anyhow::bail!("search.adapter_timeout_secs must be greater than 0");
        }

        if !(1..=5).contains(&search.fallback_max_candidates) {
            anyhow::bail!(
                "search.fallback_max_candidates must be between 1 and 5, got {}",
                search.fallback_max_candidates
            );
        }

        if search.fallback_max_articles == 0 {
            anyhow::bail!("search.fallback_max_articles must be greater than 0");
        }

        if search.home_region_marker.trim().is_empty() {
            anyhow::bail!("search.home_region_marker must not be empty");
        }

        for (name, base_url, timeout) in [
            ("rossko", &self.rossko.base_url, self.rossko.timeout_secs),
            ("autotrade", &self.autotrade.base_url, self.autotrade.timeout_secs),
            ("berg", &self.berg.base_url, self.berg.timeout_secs),
            ("autostels", &self.autostels.base_url, self.autostels.timeout_secs),
        ] {
            url::Url::parse(base_url)
                .with_context(|| format!("{name}.base_url is not a valid URL: {base_url}"))?;
            if timeout == 0 {
                anyhow::bail!("{name}.timeout_secs must be greater than 0");
            }
        }

        for (name, limit) in [
            ("autostels.max_step2_candidates", self.autostels.max_step2_candidates),
            ("berg.max_brand_requeries", self.berg.max_brand_requeries),
        ] {
            if !(1..=5).contains(&limit) {
                anyhow::bail!("{name} must be between 1 and 5, got {limit}");
            }
        }

        // The placeholder row is only built when Rossko fails inside the adapter deadline
        if self.rossko.placeholder_on_failure
            && self.rossko.timeout_secs >= search.adapter_timeout_secs
        {
            anyhow::bail!(
                "rossko.timeout_secs ({}) must be below search.adapter_timeout_secs ({}) when placeholder_on_failure is set",
                self.rossko.timeout_secs,
                search.adapter_timeout_secs
            );
        }

        let guards = &self.guards;
        if guards.rate_limit_enabled {
            if guards.rate_limit_max_requests == 0 {
                anyhow::bail!("guards.rate_limit_max_requests must be greater than 0");
            }
            if guards.rate_limit_window_secs == 0 {
                anyhow::bail!("guards.rate_limit_window_secs must be greater than 0");
            }
        }

        if guards.cache_backend == CacheBackend::Redis && guards.redis_url.is_none() {
            anyhow::bail!("guards.redis_url is required for the redis cache backend");
        }

        if guards.cache_backend != CacheBackend::None && guards.cache_ttl_secs == 0 {
            anyhow::bail!("guards.cache_ttl_secs must be greater than 0");
        }

        Ok(())
    }

    /// Get per-adapter deadline as Duration
    #[must_use]
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.search.adapter_timeout_secs)
    }
}
