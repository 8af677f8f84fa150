//! walletbook-fx
//!
//! Pair-rate lookups against an ExchangeRate-API compatible REST endpoint:
//! `GET {base_url}/{api_key}/pair/{FROM}/{TO}`.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use walletbook_config::Config;
use walletbook_core::{CoreError, RateProvider};
use walletbook_domain::CurrencyCode;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FxError {
    #[error("exchange API key is not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error("API error: {0}")]
    Api(String),
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl From<FxError> for CoreError {
    fn from(err: FxError) -> Self {
        CoreError::RateUnavailable(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    #[serde(default)]
    conversion_rate: Option<f64>,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
}

/// Blocking HTTP rate provider.
#[derive(Clone)]
pub struct HttpRateProvider {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl HttpRateProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, FxError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(FxError::MissingApiKey);
        }
        let agent = ureq::AgentBuilder::new().timeout(DEFAULT_TIMEOUT).build();
        Ok(Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Fails before any request when no key is configured.
    pub fn from_config(config: &Config) -> Result<Self, FxError> {
        let key = config.require_api_key().map_err(|_| FxError::MissingApiKey)?;
        Self::new(config.exchange_api_base_url.as_str(), key)
    }

    pub fn pair_url(&self, from: &CurrencyCode, to: &CurrencyCode) -> String {
        format!("{}/{}/pair/{}/{}", self.base_url, self.api_key, from, to)
    }

    pub fn pair_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64, FxError> {
        let url = self.pair_url(from, to);
        debug!(%from, %to, "requesting exchange rate");
        let body = match self.agent.get(&url).call() {
            Ok(response) => response
                .into_string()
                .map_err(|err| FxError::Transport(err.to_string()))?,
            // The API reports bad keys and unsupported codes with a JSON body
            // on 4xx responses.
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(match parse_pair_response(&body) {
                    Err(FxError::Api(kind)) => FxError::Api(kind),
                    _ => FxError::Status(code),
                });
            }
            Err(ureq::Error::Transport(err)) => return Err(FxError::Transport(err.to_string())),
        };
        parse_pair_response(&body)
    }
}

impl RateProvider for HttpRateProvider {
    fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64, CoreError> {
        self.pair_rate(from, to)
            .inspect_err(|err| warn!(%from, %to, error = %err, "exchange rate lookup failed"))
            .map_err(CoreError::from)
    }
}

fn parse_pair_response(body: &str) -> Result<f64, FxError> {
    let parsed: PairResponse =
        serde_json::from_str(body).map_err(|err| FxError::Malformed(err.to_string()))?;
    match parsed.result.as_str() {
        "success" => parsed
            .conversion_rate
            .ok_or_else(|| FxError::Malformed("missing conversion_rate".into())),
        "error" => Err(FxError::Api(
            parsed.error_type.unwrap_or_else(|| "unknown-error".into()),
        )),
        other => Err(FxError::Malformed(format!("unknown result `{}`", other))),
    }
}
