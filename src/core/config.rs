use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::api::models::{Asset, TradeSide};

const DEFAULT_BASE_URL: &str = "sandbox.cybrid.app";
const DEFAULT_URL_SCHEME: &str = "https";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TRADE_SYMBOL: &str = "BTC-USD";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bank: BankConfig,
    pub polling: PollingConfig,
    pub trade: TradeConfig,
}

#[derive(Clone)]
pub struct BankConfig {
    pub bank_guid: String,
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub url_scheme: String,
    pub http_timeout: Duration,
}

impl fmt::Debug for BankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankConfig")
            .field("bank_guid", &self.bank_guid)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("url_scheme", &self.url_scheme)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl BankConfig {
    /// Host serving the OAuth token endpoint.
    pub fn identity_url(&self) -> String {
        format!("{}://id.{}", self.url_scheme, self.base_url)
    }

    /// Host serving the bank API (customers, accounts, quotes, trades).
    pub fn bank_url(&self) -> String {
        format!("{}://bank.{}", self.url_scheme, self.base_url)
    }
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct TradeConfig {
    pub symbol: String,
    pub side: TradeSide,
    pub amount: Decimal,
    pub balance_tolerance: Decimal,
}

impl TradeConfig {
    /// Asset credited or debited on the trading account (the left side of the symbol).
    pub fn base_asset(&self) -> Result<Asset, ConfigError> {
        let code = self
            .symbol
            .split_once('-')
            .map(|(base, _)| base)
            .ok_or_else(|| ConfigError::Invalid {
                key: "TRADE_SYMBOL",
                reason: format!("expected BASE-COUNTER, got {}", self.symbol),
            })?;

        Asset::from_code(code).ok_or_else(|| ConfigError::Invalid {
            key: "TRADE_SYMBOL",
            reason: format!("unsupported asset {}", code),
        })
    }

    pub fn counter_asset(&self) -> Result<Asset, ConfigError> {
        let code = self
            .symbol
            .split_once('-')
            .map(|(_, counter)| counter)
            .ok_or_else(|| ConfigError::Invalid {
                key: "TRADE_SYMBOL",
                reason: format!("expected BASE-COUNTER, got {}", self.symbol),
            })?;

        Asset::from_code(code).ok_or_else(|| ConfigError::Invalid {
            key: "TRADE_SYMBOL",
            reason: format!("unsupported asset {}", code),
        })
    }
}

impl Config {
    /// Builds the configuration from an arbitrary key lookup, so callers can
    /// supply settings without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bank_guid = required("BANK_GUID")?;
        let client_id = required("APPLICATION_CLIENT_ID")?;
        let client_secret = required("APPLICATION_CLIENT_SECRET")?;

        let config = Config {
            bank: BankConfig {
                bank_guid,
                client_id,
                client_secret,
                base_url: get("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                url_scheme: get("URL_SCHEME").unwrap_or_else(|| DEFAULT_URL_SCHEME.to_string()),
                http_timeout: Duration::from_secs(parse_or(
                    "HTTP_TIMEOUT_SECS",
                    get("HTTP_TIMEOUT_SECS"),
                    DEFAULT_HTTP_TIMEOUT_SECS,
                )?),
            },
            polling: PollingConfig {
                timeout: Duration::from_secs(parse_or(
                    "TIMEOUT",
                    get("TIMEOUT"),
                    DEFAULT_TIMEOUT_SECS,
                )?),
                interval: Duration::from_millis(parse_or(
                    "POLL_INTERVAL_MS",
                    get("POLL_INTERVAL_MS"),
                    DEFAULT_POLL_INTERVAL_MS,
                )?),
            },
            trade: TradeConfig {
                symbol: get("TRADE_SYMBOL")
                    .unwrap_or_else(|| DEFAULT_TRADE_SYMBOL.to_string())
                    .to_uppercase(),
                side: parse_or("TRADE_SIDE", get("TRADE_SIDE"), TradeSide::Buy)?,
                amount: parse_or(
                    "TRADE_AMOUNT",
                    get("TRADE_AMOUNT"),
                    Decimal::new(1, 3),
                )?,
                balance_tolerance: parse_or(
                    "BALANCE_TOLERANCE",
                    get("BALANCE_TOLERANCE"),
                    Decimal::ZERO,
                )?,
            },
        };

        if config.trade.amount <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "TRADE_AMOUNT",
                reason: "must be positive".to_string(),
            });
        }
        if config.trade.balance_tolerance < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                key: "BALANCE_TOLERANCE",
                reason: "must not be negative".to_string(),
            });
        }
        config.trade.base_asset()?;
        config.trade.counter_asset()?;

        Ok(config)
    }
}

/// Loads a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    dotenv::dotenv().ok();
}

pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Log level for the subscriber. Read on its own so logging is up before the
/// rest of the configuration is validated.
pub fn log_level_from_env() -> String {
    log_level(env_lookup)
}

fn log_level<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_LEVEL")
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BANK_GUID", "bank-1"),
        ("APPLICATION_CLIENT_ID", "client"),
        ("APPLICATION_CLIENT_SECRET", "s3cr3t-value"),
    ];

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.bank.bank_guid, "bank-1");
        assert_eq!(config.bank.bank_url(), "https://bank.sandbox.cybrid.app");
        assert_eq!(config.bank.identity_url(), "https://id.sandbox.cybrid.app");
        assert_eq!(config.polling.timeout, Duration::from_secs(30));
        assert_eq!(config.polling.interval, Duration::from_millis(1000));
        assert_eq!(config.trade.symbol, "BTC-USD");
        assert_eq!(config.trade.side, TradeSide::Buy);
        assert_eq!(config.trade.amount, Decimal::new(1, 3));
        assert_eq!(config.trade.balance_tolerance, Decimal::ZERO);
    }

    #[test]
    fn test_log_level_defaults_when_unset_or_blank() {
        assert_eq!(log_level(lookup(&[])), "info");
        assert_eq!(log_level(lookup(&[("LOG_LEVEL", " ")])), "info");
        assert_eq!(log_level(lookup(&[("LOG_LEVEL", "debug")])), "debug");
    }

    #[test]
    fn test_missing_secret_is_reported_by_name() {
        let err = Config::from_lookup(lookup(&[
            ("BANK_GUID", "bank-1"),
            ("APPLICATION_CLIENT_ID", "client"),
        ]))
        .unwrap_err();

        assert_eq!(err, ConfigError::Missing("APPLICATION_CLIENT_SECRET"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[
            ("BANK_GUID", "  "),
            ("APPLICATION_CLIENT_ID", "client"),
            ("APPLICATION_CLIENT_SECRET", "secret"),
        ]))
        .unwrap_err();

        assert_eq!(err, ConfigError::Missing("BANK_GUID"));
    }

    #[test]
    fn test_overrides_and_parse_errors() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("URL_SCHEME", "http"),
            ("BASE_URL", "localhost:8080"),
            ("TRADE_AMOUNT", "0.25"),
            ("TRADE_SIDE", "sell"),
            ("BALANCE_TOLERANCE", "0.0001"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.bank.bank_url(), "http://bank.localhost:8080");
        assert_eq!(config.trade.amount, Decimal::new(25, 2));
        assert_eq!(config.trade.side, TradeSide::Sell);
        assert_eq!(config.trade.balance_tolerance, Decimal::new(1, 4));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TIMEOUT", "soon"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TIMEOUT", .. }));
    }

    #[test]
    fn test_rejects_unknown_symbol_and_non_positive_amount() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TRADE_SYMBOL", "DOGE-USD"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TRADE_SYMBOL", .. }));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TRADE_AMOUNT", "0"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TRADE_AMOUNT", .. }));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("s3cr3t-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
