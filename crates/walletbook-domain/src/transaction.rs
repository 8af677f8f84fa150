//! Domain models for recorded income and expense transactions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{category::CategoryKind, common::*};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    /// Always positive; the direction comes from `kind`.
    pub amount: f64,
    pub kind: CategoryKind,
    pub category_id: Uuid,
    pub wallet_id: Uuid,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub exclude_from_report: bool,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        amount: f64,
        kind: CategoryKind,
        category_id: Uuid,
        wallet_id: Uuid,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            amount,
            kind,
            category_id,
            wallet_id,
            currency,
            description: None,
            attachments: Vec::new(),
            event_id: None,
            exclude_from_report: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_event(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn excluded_from_report(mut self) -> Self {
        self.exclude_from_report = true;
        self
    }

    /// Amount with its direction applied: income positive, expense negative.
    pub fn signed_amount(&self) -> f64 {
        self.amount * self.kind.sign()
    }
}

impl Identifiable for Transaction {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Displayable for Transaction {
    fn display_label(&self) -> String {
        let description = self.description.as_deref().unwrap_or("");
        format!(
            "{} {:+.2} {} {}",
            self.date,
            self.signed_amount(),
            self.currency,
            description
        )
        .trim_end()
        .to_string()
    }
}

/// A file attached to a transaction during the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: CategoryKind) -> Transaction {
        Transaction::new(
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            42.5,
            kind,
            Uuid::new_v4(),
            Uuid::new_v4(),
            CurrencyCode::new("USD"),
        )
    }

    #[test]
    fn signed_amount_follows_kind() {
        assert_eq!(sample(CategoryKind::Income).signed_amount(), 42.5);
        assert_eq!(sample(CategoryKind::Expense).signed_amount(), -42.5);
    }

    #[test]
    fn attachments_are_not_serialized() {
        let mut txn = sample(CategoryKind::Expense);
        txn.attachments.push(Attachment::new("receipt.png", vec![1, 2, 3]));

        let json = serde_json::to_string(&txn).unwrap();
        assert!(!json.contains("receipt.png"));
        assert!(json.contains("excludeFromReport"));

        let restored: Transaction = serde_json::from_str(&json).unwrap();
        assert!(restored.attachments.is_empty());
        assert_eq!(restored.amount, txn.amount);
    }
}
