//! Travel mode pairs a foreign currency with an event while a trip lasts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::CurrencyCode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TravelMode {
    pub currency: CurrencyCode,
    pub event_id: Uuid,
    /// Units of the home currency per one unit of `currency`.
    pub rate: f64,
}

impl TravelMode {
    pub fn new(currency: CurrencyCode, event_id: Uuid, rate: f64) -> Self {
        Self {
            currency,
            event_id,
            rate,
        }
    }
}
