//! Application configuration.

use crate::error::{AppError, AppResult};
use dealer_core::{Credentials, Feed};
use dealer_executor::{ExecutionConfig, DEFAULT_REQUIRED_FEEDS};
use dealer_ws::{LifecycleConfig, Topic};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAINNET_WS_URL: &str = "wss://www.bitmex.com/realtime";
const TESTNET_WS_URL: &str = "wss://testnet.bitmex.com/realtime";
const MAINNET_REST_URL: &str = "https://www.bitmex.com";
const TESTNET_REST_URL: &str = "https://testnet.bitmex.com";

/// Hedging venue connection and trading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// API key. May be overridden by `DEALER_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// API secret. May be overridden by `DEALER_API_SECRET`.
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// Use the testnet endpoints.
    #[serde(default)]
    pub testnet: bool,
    /// Stream URL override.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// REST origin override (scheme and host, no path).
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Instrument symbol (e.g. "XBTUSD").
    pub product: String,
    /// Contracts per lot. Default: 100.
    #[serde(default = "default_lot_size")]
    pub lot_size: u64,
    /// Normalized settlement currency balances are read from. Default: "XBT".
    #[serde(default = "default_settlement_currency")]
    pub settlement_currency: String,
    /// Collateral requirement in percent of notional (15 = 15%).
    pub collateral_pct: Decimal,
    /// Tolerated drift from the target collateral, in percent.
    #[serde(default)]
    pub max_collateral_deviation: Decimal,
    /// Signed order lifetime (s). Default: 60.
    #[serde(default = "default_order_expiry_secs")]
    pub order_expiry_secs: u64,
    /// Stream auth signature lifetime (s). Default: 5.
    #[serde(default = "default_auth_expiry_secs")]
    pub auth_expiry_secs: u64,
    /// REST transport timeout (ms). Default: 10,000.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Feeds that must be initialized before the adapter is ready.
    #[serde(default = "default_required_feeds")]
    pub required_feeds: Vec<Feed>,
}

fn default_lot_size() -> u64 {
    100
}

fn default_settlement_currency() -> String {
    "XBT".to_string()
}

fn default_order_expiry_secs() -> u64 {
    60
}

fn default_auth_expiry_secs() -> u64 {
    5
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_required_feeds() -> Vec<Feed> {
    DEFAULT_REQUIRED_FEEDS.to_vec()
}

impl VenueConfig {
    /// Stream URL: explicit override, else mainnet or testnet.
    pub fn ws_url(&self) -> &str {
        match (&self.ws_url, self.testnet) {
            (Some(url), _) => url.as_str(),
            (None, true) => TESTNET_WS_URL,
            (None, false) => MAINNET_WS_URL,
        }
    }

    /// REST origin: explicit override, else mainnet or testnet.
    pub fn rest_url(&self) -> &str {
        match (&self.rest_url, self.testnet) {
            (Some(url), _) => url.as_str(),
            (None, true) => TESTNET_REST_URL,
            (None, false) => MAINNET_REST_URL,
        }
    }

    /// Credentials, or `None` when either half is missing.
    pub fn credentials(&self) -> Option<Credentials> {
        let creds = Credentials::new(self.api_key.clone(), self.api_secret.clone());
        (!creds.is_empty()).then_some(creds)
    }

    /// Collateral fraction of notional (`collateral_pct / 100`).
    pub fn collateral_ratio(&self) -> Decimal {
        self.collateral_pct / Decimal::ONE_HUNDRED
    }

    /// Effective leverage (`100 / collateral_pct`).
    pub fn leverage(&self) -> Option<Decimal> {
        Decimal::ONE_HUNDRED.checked_div(self.collateral_pct)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            url: self.ws_url().to_string(),
            instrument: self.product.clone(),
            credentials: self.credentials(),
            auth_expiry_secs: self.auth_expiry_secs,
            topics: Topic::ALL.to_vec(),
        }
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            symbol: self.product.clone(),
            lot_size: self.lot_size,
            order_expiry_secs: self.order_expiry_secs,
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.product.trim().is_empty() {
            return Err(AppError::Config("venue.product must not be empty".into()));
        }
        if self.lot_size == 0 {
            return Err(AppError::Config("venue.lot_size must be positive".into()));
        }
        if self.collateral_pct <= Decimal::ZERO {
            return Err(AppError::Config(
                "venue.collateral_pct must be positive".into(),
            ));
        }
        if self.max_collateral_deviation < Decimal::ZERO {
            return Err(AppError::Config(
                "venue.max_collateral_deviation must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Hedging policy parameters consumed by the dealer above the adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HedgerConfig {
    /// Largest volume offered on the maker side, in contracts.
    #[serde(default)]
    pub max_offer_volume: Decimal,
}

/// Supervisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Delay before rebuilding a failed adapter (s). Default: 10.
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,
    /// Status log interval (s). Default: 30.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    /// Whether the run switch starts on. Default: true.
    #[serde(default = "default_start_enabled")]
    pub start_enabled: bool,
}

fn default_restart_delay_secs() -> u64 {
    10
}

fn default_status_interval_secs() -> u64 {
    30
}

fn default_start_enabled() -> bool {
    true
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            restart_delay_secs: default_restart_delay_secs(),
            status_interval_secs: default_status_interval_secs(),
            start_enabled: default_start_enabled(),
        }
    }
}

impl SupervisorConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub venue: VenueConfig,
    #[serde(default)]
    pub hedger: HedgerConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl AppConfig {
    /// Load from a specific file, apply credential overrides and validate.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        config.venue.validate()?;
        Ok(config)
    }

    /// Parse without environment overrides or validation.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Replace credentials with `DEALER_API_KEY` / `DEALER_API_SECRET` when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("DEALER_API_KEY") {
            self.venue.api_key = key;
        }
        if let Ok(secret) = std::env::var("DEALER_API_SECRET") {
            self.venue.api_secret = secret;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        self.venue.validate()
    }
}
