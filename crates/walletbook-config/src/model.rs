use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use walletbook_domain::{CurrencyCode, TravelMode};

use crate::ConfigError;

pub const DEFAULT_EXCHANGE_API_BASE_URL: &str = "https://v6.exchangerate-api.com/v6";

/// User settings persisted next to the data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "Config::default_locale")]
    pub locale: String,
    /// Home currency used for new wallets and travel conversions.
    #[serde(default)]
    pub default_currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_api_key: Option<String>,
    #[serde(default = "Config::default_exchange_api_base_url")]
    pub exchange_api_base_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom root for stored collections. Defaults to `~/Documents/Walletbook`.
    pub data_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_mode: Option<TravelMode>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: Self::default_locale(),
            default_currency: CurrencyCode::default(),
            exchange_api_key: None,
            exchange_api_base_url: Self::default_exchange_api_base_url(),
            data_dir: None,
            travel_mode: None,
        }
    }
}

impl Config {
    pub fn default_locale() -> String {
        "en-US".into()
    }

    pub fn default_exchange_api_base_url() -> String {
        DEFAULT_EXCHANGE_API_BASE_URL.into()
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(path) = &self.data_dir {
            return path.clone();
        }

        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("Walletbook")
    }

    /// The API key, or an error when none is configured or it is blank.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.exchange_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Invalid("exchange API key is not configured".into()))
    }

    pub fn is_travelling(&self) -> bool {
        self.travel_mode.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.default_currency.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "`{}` is not a three-letter currency code",
                self.default_currency
            )));
        }
        if self.exchange_api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("exchange API base URL is empty".into()));
        }
        if let Some(mode) = &self.travel_mode {
            if !(mode.rate.is_finite() && mode.rate > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "travel rate {} must be a positive number",
                    mode.rate
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = serde_json::from_str("{}").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.default_currency.as_str(), "USD");
        assert_eq!(config.exchange_api_base_url, DEFAULT_EXCHANGE_API_BASE_URL);
    }

    #[test]
    fn blank_api_key_is_rejected() {
        let mut config = Config::default();
        assert!(config.require_api_key().is_err());
        config.exchange_api_key = Some("   ".into());
        assert!(config.require_api_key().is_err());
        config.exchange_api_key = Some(" abc123 ".into());
        assert_eq!(config.require_api_key().expect("key"), "abc123");
    }

    #[test]
    fn explicit_data_dir_wins() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/wb")),
            ..Config::default()
        };
        assert_eq!(config.resolve_data_dir(), PathBuf::from("/tmp/wb"));
    }
}
