//! Shared traits, currency codes, and date windows used across the book.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exposes a stable identifier for entities stored in the book.
pub trait Identifiable {
    fn id(&self) -> Uuid;
}

/// Provides read-only access to an entity's display name.
pub trait NamedEntity {
    fn name(&self) -> &str;
}

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// ISO 4217 currency representation, always stored upper-case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of decimal places used when rounding amounts in this currency.
    pub fn minor_units(&self) -> u8 {
        minor_units_for(self.as_str())
    }

    /// Smallest representable amount, e.g. 0.01 for USD and 1 for JPY.
    pub fn minor_unit(&self) -> f64 {
        10f64.powi(-(self.minor_units() as i32))
    }

    /// Rounds `amount` to the currency's minor units.
    pub fn round(&self, amount: f64) -> f64 {
        let factor = 10f64.powi(self.minor_units() as i32);
        (amount * factor).round() / factor
    }

    pub fn is_valid(&self) -> bool {
        self.0.len() == 3 && self.0.chars().all(|c| c.is_ascii_uppercase())
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl From<String> for CurrencyCode {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for CurrencyCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn minor_units_for(code: &str) -> u8 {
    match code {
        "JPY" | "KRW" | "VND" | "IDR" => 0,
        "KWD" | "BHD" | "OMR" => 3,
        _ => 2,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Inclusive reporting window over calendar dates.
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateWindowError> {
        if end < start {
            return Err(DateWindowError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// Window covering the whole calendar month of `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date);
        let (year, month) = if date.month() == 12 {
            (date.year() + 1, 1)
        } else {
            (date.year(), date.month() + 1)
        };
        let end = NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|first| first.pred_opt())
            .unwrap_or(date);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing [`DateWindow`] values.
pub enum DateWindowError {
    InvalidRange,
}

impl fmt::Display for DateWindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateWindowError::InvalidRange => f.write_str("date window end must not precede start"),
        }
    }
}

impl std::error::Error for DateWindowError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_code_normalizes_case() {
        let code = CurrencyCode::new(" eur ");
        assert_eq!(code.as_str(), "EUR");
        assert!(code.is_valid());
        let parsed: CurrencyCode = serde_json::from_str("\"vnd\"").unwrap();
        assert_eq!(parsed, CurrencyCode::new("VND"));
    }

    #[test]
    fn rounding_follows_minor_units() {
        assert_eq!(CurrencyCode::new("USD").round(10.005_1), 10.01);
        assert_eq!(CurrencyCode::new("JPY").round(1234.6), 1235.0);
        assert_eq!(CurrencyCode::new("JPY").minor_unit(), 1.0);
        assert!((CurrencyCode::new("USD").minor_unit() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn month_window_spans_calendar_month() {
        let window = DateWindow::month_of(NaiveDate::from_ymd_opt(2024, 2, 17).unwrap());
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(window.end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(window.contains(window.end));

        let december = DateWindow::month_of(NaiveDate::from_ymd_opt(2023, 12, 5).unwrap());
        assert_eq!(december.end, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(DateWindow::new(start, end), Err(DateWindowError::InvalidRange));
    }
}
