use tracing::info;
use uuid::Uuid;
use walletbook_domain::{Book, CurrencyCode, Transaction, TravelMode};

use crate::CoreError;

pub struct TravelService;

impl TravelService {
    /// Builds a travel mode for an existing, active event.
    pub fn activate(
        book: &Book,
        currency: CurrencyCode,
        event_id: Uuid,
        rate: f64,
    ) -> Result<TravelMode, CoreError> {
        if !currency.is_valid() {
            return Err(CoreError::Validation(format!(
                "`{}` is not a three-letter currency code",
                currency
            )));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CoreError::Validation(
                "Travel rate must be a positive number".into(),
            ));
        }
        let event = book.event(event_id).ok_or(CoreError::EventNotFound(event_id))?;
        if !event.is_active() {
            return Err(CoreError::Validation(format!(
                "Event `{}` is inactive",
                event.name
            )));
        }
        info!(%currency, event = %event.name, rate, "travel mode activated");
        Ok(TravelMode::new(currency, event_id, rate))
    }

    /// Tags an untagged transaction with the travel event. Returns whether it changed.
    pub fn tag(mode: Option<&TravelMode>, txn: &mut Transaction) -> bool {
        match mode {
            Some(mode) if txn.event_id.is_none() => {
                txn.event_id = Some(mode.event_id);
                true
            }
            _ => false,
        }
    }

    /// Amount to show for `txn` in the home currency while travelling.
    pub fn display_amount(
        mode: Option<&TravelMode>,
        home: &CurrencyCode,
        txn: &Transaction,
    ) -> (f64, CurrencyCode) {
        match mode {
            Some(mode) if txn.currency == mode.currency && &mode.currency != home => {
                (home.round(txn.amount * mode.rate), home.clone())
            }
            _ => (txn.amount, txn.currency.clone()),
        }
    }

    /// A travel mode whose event disappeared or was closed should be switched off.
    pub fn is_stale(book: &Book, mode: &TravelMode) -> bool {
        book.event(mode.event_id).map_or(true, |event| !event.is_active())
    }
}
