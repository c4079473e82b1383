//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::types::{Broker, Exchange};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Symbol registry database (in-memory registry when absent)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Order routing settings
    #[serde(default)]
    pub router: RouterSettings,
    /// Trade-event reconciliation defaults
    #[serde(default)]
    pub trade_events: TradeEventSettings,
    /// Broker connections, one per account
    #[serde(default)]
    pub gateways: Vec<GatewayConfig>,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Trade-event settings for one gateway, with its overrides applied
    pub fn trade_events_for(&self, gateway: &GatewayConfig) -> TradeEventSettings {
        let mut merged = self.trade_events.clone();
        if let Some(ref overrides) = gateway.trade_events {
            if let Some(enabled) = overrides.enabled {
                merged.enabled = enabled;
            }
            if let Some(debounce_ms) = overrides.debounce_ms {
                merged.debounce_ms = debounce_ms;
            }
        }
        merged
    }
}

/// Database configuration for the symbol registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            connection_timeout_seconds: default_connection_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    30
}

/// Order routing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Exchange used when an intent names none
    #[serde(default)]
    pub default_exchange: Exchange,
    /// Exchange implied by a futures-pattern symbol
    #[serde(default = "default_futures_exchange")]
    pub futures_home_exchange: Exchange,
    /// First exchange tried for futures contract lookups
    #[serde(default = "default_futures_exchange")]
    pub futures_primary_exchange: Exchange,
    /// Fallback exchange for futures contract lookups
    #[serde(default = "default_futures_secondary_exchange")]
    pub futures_secondary_exchange: Exchange,
    /// The single currency accepted for equity lookups
    #[serde(default = "default_equity_currency")]
    pub equity_currency: String,
    /// Contract lookup timeout in milliseconds
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_ms: u64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_exchange: Exchange::Smart,
            futures_home_exchange: default_futures_exchange(),
            futures_primary_exchange: default_futures_exchange(),
            futures_secondary_exchange: default_futures_secondary_exchange(),
            equity_currency: default_equity_currency(),
            lookup_timeout_ms: default_lookup_timeout(),
        }
    }
}

impl RouterSettings {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }
}

fn default_futures_exchange() -> Exchange {
    Exchange::Cme
}

fn default_futures_secondary_exchange() -> Exchange {
    Exchange::Cbot
}

fn default_equity_currency() -> String {
    "USD".to_string()
}

fn default_lookup_timeout() -> u64 {
    5000
}

/// Trade-event reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEventSettings {
    /// Whether trade-event workers are started
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before a consolidated resync after a fill or cancel
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    /// Time allowed after start before silence counts as NO_MESSAGES
    #[serde(default = "default_startup_grace")]
    pub startup_grace_secs: u64,
    /// Age of the last message after which the stream counts as STALE
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    /// Minimum interval between repeated logs of the same health issue
    #[serde(default = "default_health_log_interval")]
    pub health_log_interval_secs: u64,
    /// Period of the health tick scheduler
    #[serde(default = "default_health_tick")]
    pub health_tick_secs: u64,
    /// Bounded wait for workers to stop at shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl Default for TradeEventSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce(),
            startup_grace_secs: default_startup_grace(),
            stale_after_secs: default_stale_after(),
            health_log_interval_secs: default_health_log_interval(),
            health_tick_secs: default_health_tick(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl TradeEventSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_secs(self.startup_grace_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn health_log_interval(&self) -> Duration {
        Duration::from_secs(self.health_log_interval_secs)
    }

    pub fn health_tick(&self) -> Duration {
        Duration::from_secs(self.health_tick_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_true() -> bool {
    true
}

fn default_debounce() -> u64 {
    1000
}

fn default_startup_grace() -> u64 {
    30
}

fn default_stale_after() -> u64 {
    120
}

fn default_health_log_interval() -> u64 {
    60
}

fn default_health_tick() -> u64 {
    5
}

fn default_shutdown_timeout() -> u64 {
    1500
}

/// One broker connection (gateway) bound to an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway name, also the account name used by `send_order`
    pub name: String,
    /// Broker kind
    pub broker: Broker,
    /// Broker account id the trade-event stream is subscribed for
    #[serde(default)]
    pub account_id: Option<String>,
    /// Per-gateway trade-event overrides
    #[serde(default)]
    pub trade_events: Option<TradeEventOverrides>,
}

/// Per-gateway overrides of [`TradeEventSettings`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeEventOverrides {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub debounce_ms: Option<u64>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_event_defaults() {
        let settings = TradeEventSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.debounce(), Duration::from_secs(1));
        assert_eq!(settings.shutdown_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_router_defaults() {
        let settings = RouterSettings::default();
        assert_eq!(settings.default_exchange, Exchange::Smart);
        assert_eq!(settings.futures_home_exchange, Exchange::Cme);
        assert_eq!(settings.lookup_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_gateway_overrides_merge() {
        let config = AppConfig::default();
        let gateway = GatewayConfig {
            name: "webull_main".to_string(),
            broker: Broker::Webull,
            account_id: Some("acct1".to_string()),
            trade_events: Some(TradeEventOverrides {
                enabled: None,
                debounce_ms: Some(250),
            }),
        };

        let merged = config.trade_events_for(&gateway);
        assert!(merged.enabled);
        assert_eq!(merged.debounce_ms, 250);
    }
}
