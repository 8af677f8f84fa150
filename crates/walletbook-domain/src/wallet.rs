//! Wallets: named money containers with a currency and a manual base balance.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: Uuid,
    pub name: String,
    pub currency: CurrencyCode,
    /// Manually entered opening balance; the live balance adds transactions on top.
    pub balance: f64,
    /// Categories selectable for this wallet. Empty means every category.
    #[serde(default)]
    pub linked_category_ids: Vec<Uuid>,
}

impl Wallet {
    pub fn new(name: impl Into<String>, currency: CurrencyCode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            currency,
            balance: 0.0,
            linked_category_ids: Vec::new(),
        }
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    pub fn restricts_categories(&self) -> bool {
        !self.linked_category_ids.is_empty()
    }
}

impl Identifiable for Wallet {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Wallet {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Wallet {
    fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.currency)
    }
}
