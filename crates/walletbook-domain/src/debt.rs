//! Payable and receivable obligations with partial-payment tracking.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// Amounts closer than this are treated as equal when settling debts.
pub const SETTLEMENT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub id: Uuid,
    pub kind: DebtKind,
    pub person: String,
    pub amount: f64,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub status: DebtStatus,
    #[serde(default)]
    pub payments: Vec<DebtPayment>,
}

impl Debt {
    pub fn new(
        kind: DebtKind,
        person: impl Into<String>,
        amount: f64,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            person: person.into(),
            amount,
            currency,
            due_date: None,
            note: None,
            status: DebtStatus::Unpaid,
            payments: Vec::new(),
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn paid_total(&self) -> f64 {
        self.payments.iter().map(|payment| payment.amount).sum()
    }

    pub fn remaining(&self) -> f64 {
        (self.amount - self.paid_total()).max(0.0)
    }

    /// Status implied by the current payments.
    pub fn derived_status(&self) -> DebtStatus {
        let paid = self.paid_total();
        if paid <= SETTLEMENT_EPSILON {
            DebtStatus::Unpaid
        } else if paid + SETTLEMENT_EPSILON < self.amount {
            DebtStatus::Partial
        } else {
            DebtStatus::Paid
        }
    }

    pub fn refresh_status(&mut self) {
        self.status = self.derived_status();
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != DebtStatus::Paid && self.due_date.is_some_and(|due| due < today)
    }
}

impl Identifiable for Debt {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Debt {
    fn display_label(&self) -> String {
        format!(
            "{} {} {:.2} {} [{}]",
            self.kind, self.person, self.amount, self.currency, self.status
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebtPayment {
    pub id: Uuid,
    pub date: NaiveDate,
    pub amount: f64,
}

impl DebtPayment {
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            amount,
        }
    }
}

/// Whether the user owes the money or is owed it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DebtKind {
    Payable,
    Receivable,
}

impl fmt::Display for DebtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DebtKind::Payable => "Payable",
            DebtKind::Receivable => "Receivable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
}

impl fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DebtStatus::Unpaid => "Unpaid",
            DebtStatus::Partial => "Partial",
            DebtStatus::Paid => "Paid",
        };
        f.write_str(label)
    }
}
