//! Moves every record held in one currency to another, either converting the
//! amounts with a fetched rate or only relabelling them.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walletbook_domain::{Book, CurrencyCode, Debt, DebtStatus};

use crate::{
    exchange::{validate_rate, RateProvider},
    CoreError,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Multiply amounts by the exchange rate.
    Convert,
    /// Keep amounts, change only the currency label.
    Relabel,
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionMode::Convert => f.write_str("convert"),
            ConversionMode::Relabel => f.write_str("relabel"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionReport {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub mode: ConversionMode,
    /// 1.0 for relabelling.
    pub rate: f64,
    pub transactions: usize,
    pub wallets: usize,
    pub debts: usize,
}

impl ConversionReport {
    pub fn touched(&self) -> usize {
        self.transactions + self.wallets + self.debts
    }
}

pub struct CurrencyService;

impl CurrencyService {
    /// Migrates transactions, wallets and debts from `from` to `to`.
    ///
    /// The rate is fetched before anything changes and the migration runs on a
    /// staged copy, so a failure leaves `book` exactly as it was.
    pub fn migrate(
        book: &mut Book,
        provider: &dyn RateProvider,
        from: &CurrencyCode,
        to: &CurrencyCode,
        mode: ConversionMode,
    ) -> Result<ConversionReport, CoreError> {
        if from == to {
            return Err(CoreError::Validation(format!(
                "Source and target currency are both {}",
                from
            )));
        }
        if !to.is_valid() {
            return Err(CoreError::Validation(format!(
                "`{}` is not a three-letter currency code",
                to
            )));
        }
        let rate = match mode {
            ConversionMode::Convert => provider
                .fetch_rate(from, to)
                .and_then(validate_rate)
                .inspect_err(|err| warn!(%from, %to, error = %err, "currency migration aborted"))?,
            ConversionMode::Relabel => 1.0,
        };

        let mut staged = book.clone();
        let report = Self::apply(&mut staged, from, to, mode, rate);
        *book = staged;
        info!(
            %from,
            %to,
            %mode,
            rate,
            transactions = report.transactions,
            wallets = report.wallets,
            debts = report.debts,
            "currency migrated"
        );
        Ok(report)
    }

    /// Rewrites matching records in place with an already-known rate.
    pub fn apply(
        book: &mut Book,
        from: &CurrencyCode,
        to: &CurrencyCode,
        mode: ConversionMode,
        rate: f64,
    ) -> ConversionReport {
        let convert = |amount: f64| match mode {
            ConversionMode::Convert => {
                let converted = amount * rate;
                let rounded = to.round(converted);
                // Never let rounding wipe out a non-zero amount.
                if rounded == 0.0 && converted != 0.0 {
                    converted
                } else {
                    rounded
                }
            }
            ConversionMode::Relabel => amount,
        };

        let mut report = ConversionReport {
            from: from.clone(),
            to: to.clone(),
            mode,
            rate,
            transactions: 0,
            wallets: 0,
            debts: 0,
        };

        for txn in book.transactions.iter_mut().filter(|txn| &txn.currency == from) {
            txn.amount = convert(txn.amount);
            txn.currency = to.clone();
            report.transactions += 1;
        }
        for wallet in book.wallets.iter_mut().filter(|wallet| &wallet.currency == from) {
            wallet.balance = convert(wallet.balance);
            wallet.currency = to.clone();
            report.wallets += 1;
        }
        for debt in book.debts.iter_mut().filter(|debt| &debt.currency == from) {
            let before = debt.derived_status();
            debt.amount = convert(debt.amount);
            for payment in &mut debt.payments {
                payment.amount = convert(payment.amount);
            }
            // Per-payment rounding must not flip a debt's settlement state.
            match before {
                DebtStatus::Paid => {
                    let shortfall = debt.amount - debt.paid_total();
                    if shortfall > 0.0 {
                        if let Some(last) = debt.payments.last_mut() {
                            last.amount = to.round(last.amount + shortfall);
                        }
                    }
                }
                DebtStatus::Partial if debt.derived_status() == DebtStatus::Paid => {
                    keep_one_unit_open(debt, to);
                }
                _ => {}
            }
            debt.currency = to.clone();
            debt.refresh_status();
            report.debts += 1;
        }
        report
    }
}

/// Trims payments from the newest backwards until one minor unit of `to`
/// is still owed. Payments never drop below one minor unit themselves.
fn keep_one_unit_open(debt: &mut Debt, to: &CurrencyCode) {
    let unit = to.minor_unit();
    let mut excess = debt.paid_total() - debt.amount + unit;
    for payment in debt.payments.iter_mut().rev() {
        if excess <= 0.0 {
            break;
        }
        let take = excess.min(payment.amount - unit).max(0.0);
        payment.amount = to.round(payment.amount - take);
        excess -= take;
    }
}
