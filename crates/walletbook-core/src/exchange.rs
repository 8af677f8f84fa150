use std::collections::HashMap;

use walletbook_domain::CurrencyCode;

use crate::CoreError;

/// Source of spot exchange rates: how many `to` units one `from` unit buys.
pub trait RateProvider: Send + Sync {
    fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64, CoreError>;
}

/// Fixed rate table, also answering inverse pairs and parity.
#[derive(Debug, Clone, Default)]
pub struct StaticRateProvider {
    rates: HashMap<(CurrencyCode, CurrencyCode), f64>,
}

impl StaticRateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        self.add_rate(CurrencyCode::new(from), CurrencyCode::new(to), rate);
        self
    }

    pub fn add_rate(&mut self, from: CurrencyCode, to: CurrencyCode, rate: f64) {
        self.rates.insert((from, to), rate);
    }
}

impl RateProvider for StaticRateProvider {
    fn fetch_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Result<f64, CoreError> {
        if from == to {
            return Ok(1.0);
        }
        if let Some(rate) = self.rates.get(&(from.clone(), to.clone())) {
            return Ok(*rate);
        }
        if let Some(rate) = self.rates.get(&(to.clone(), from.clone())) {
            if rate.abs() > f64::EPSILON {
                return Ok(1.0 / rate);
            }
        }
        Err(CoreError::RateUnavailable(format!("{} → {} not found", from, to)))
    }
}

/// Rejects rates that would corrupt amounts when multiplied in.
pub fn validate_rate(rate: f64) -> Result<f64, CoreError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(CoreError::RateUnavailable(format!(
            "provider returned unusable rate {}",
            rate
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_answers_inverse_pairs() {
        let provider = StaticRateProvider::new().with_rate("EUR", "USD", 1.25);
        let usd = CurrencyCode::new("USD");
        let eur = CurrencyCode::new("EUR");

        assert_eq!(provider.fetch_rate(&eur, &usd).unwrap(), 1.25);
        assert!((provider.fetch_rate(&usd, &eur).unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(provider.fetch_rate(&usd, &usd).unwrap(), 1.0);
        assert!(matches!(
            provider.fetch_rate(&usd, &CurrencyCode::new("JPY")),
            Err(CoreError::RateUnavailable(_))
        ));
    }
}
