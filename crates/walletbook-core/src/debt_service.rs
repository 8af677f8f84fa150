//! Debt bookkeeping: payments accumulate and drive the derived status.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;
use walletbook_domain::{Book, CurrencyCode, Debt, DebtKind, DebtPayment, SETTLEMENT_EPSILON};

use crate::CoreError;

pub struct DebtService;

impl DebtService {
    pub fn add(book: &mut Book, mut debt: Debt) -> Result<Uuid, CoreError> {
        debt.person = debt.person.trim().to_string();
        if debt.person.is_empty() {
            return Err(CoreError::Validation("Debt requires a person".into()));
        }
        ensure_positive(debt.amount, "Debt amount")?;
        if !debt.currency.is_valid() {
            return Err(CoreError::Validation(format!(
                "`{}` is not a three-letter currency code",
                debt.currency
            )));
        }
        if debt.paid_total() > debt.amount + SETTLEMENT_EPSILON {
            return Err(CoreError::Validation(
                "Payments exceed the debt amount".into(),
            ));
        }
        debt.refresh_status();
        let id = debt.id;
        info!(%id, kind = %debt.kind, person = %debt.person, amount = debt.amount, "debt added");
        book.debts.push(debt);
        Ok(id)
    }

    /// Edits amount, due date and note; the amount cannot drop below what was already paid.
    pub fn update_terms(
        book: &mut Book,
        id: Uuid,
        amount: f64,
        due_date: Option<NaiveDate>,
        note: Option<String>,
    ) -> Result<(), CoreError> {
        ensure_positive(amount, "Debt amount")?;
        let debt = book.debt_mut(id).ok_or(CoreError::DebtNotFound(id))?;
        if debt.paid_total() > amount + SETTLEMENT_EPSILON {
            return Err(CoreError::Validation(format!(
                "Amount {:.2} is below the {:.2} already paid",
                amount,
                debt.paid_total()
            )));
        }
        debt.amount = amount;
        debt.due_date = due_date;
        debt.note = note;
        debt.refresh_status();
        Ok(())
    }

    pub fn delete(book: &mut Book, id: Uuid) -> Result<Debt, CoreError> {
        let index = book
            .debts
            .iter()
            .position(|debt| debt.id == id)
            .ok_or(CoreError::DebtNotFound(id))?;
        info!(%id, "debt deleted");
        Ok(book.debts.remove(index))
    }

    pub fn add_payment(
        book: &mut Book,
        id: Uuid,
        date: NaiveDate,
        amount: f64,
    ) -> Result<Uuid, CoreError> {
        ensure_positive(amount, "Payment amount")?;
        let debt = book.debt_mut(id).ok_or(CoreError::DebtNotFound(id))?;
        let remaining = debt.remaining();
        if amount > remaining + SETTLEMENT_EPSILON {
            return Err(CoreError::Validation(format!(
                "Payment {:.2} exceeds the remaining {:.2}",
                amount, remaining
            )));
        }
        let payment = DebtPayment::new(date, amount);
        let payment_id = payment.id;
        debt.payments.push(payment);
        debt.refresh_status();
        info!(debt = %id, amount, status = %debt.status, "debt payment recorded");
        Ok(payment_id)
    }

    pub fn remove_payment(book: &mut Book, id: Uuid, payment_id: Uuid) -> Result<(), CoreError> {
        let debt = book.debt_mut(id).ok_or(CoreError::DebtNotFound(id))?;
        let before = debt.payments.len();
        debt.payments.retain(|payment| payment.id != payment_id);
        if debt.payments.len() == before {
            return Err(CoreError::PaymentNotFound(payment_id));
        }
        debt.refresh_status();
        Ok(())
    }

    pub fn remaining(book: &Book, id: Uuid) -> Result<f64, CoreError> {
        book.debt(id)
            .map(Debt::remaining)
            .ok_or(CoreError::DebtNotFound(id))
    }

    /// Unsettled balance per currency for one side of the ledger.
    pub fn outstanding(book: &Book, kind: DebtKind) -> BTreeMap<CurrencyCode, f64> {
        let mut totals: BTreeMap<CurrencyCode, f64> = BTreeMap::new();
        for debt in book.debts.iter().filter(|debt| debt.kind == kind) {
            let remaining = debt.remaining();
            if remaining > SETTLEMENT_EPSILON {
                *totals.entry(debt.currency.clone()).or_default() += remaining;
            }
        }
        totals
    }

    /// Unsettled debts whose due date lies before `today`, earliest first.
    pub fn overdue(book: &Book, today: NaiveDate) -> Vec<&Debt> {
        let mut overdue: Vec<&Debt> = book
            .debts
            .iter()
            .filter(|debt| debt.is_overdue(today))
            .collect();
        overdue.sort_by_key(|debt| debt.due_date);
        overdue
    }
}

fn ensure_positive(amount: f64, label: &str) -> Result<(), CoreError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{} must be a positive number",
            label
        )))
    }
}
