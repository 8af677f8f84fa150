//! Validation and querying for income/expense transactions.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;
use walletbook_domain::{Book, CategoryKind, Transaction};

use crate::{category_service::CategoryService, CoreError};

pub struct TransactionService;

impl TransactionService {
    pub fn add(book: &mut Book, transaction: Transaction) -> Result<Uuid, CoreError> {
        if book.transaction(transaction.id).is_some() {
            return Err(CoreError::Validation(format!(
                "Transaction id {} already exists",
                transaction.id
            )));
        }
        Self::validate(book, &transaction)?;
        let id = transaction.id;
        info!(%id, amount = transaction.amount, kind = %transaction.kind, "transaction added");
        book.transactions.push(transaction);
        Ok(id)
    }

    /// Applies `change` to a copy of the transaction and keeps it only if it still validates.
    pub fn update<F>(book: &mut Book, id: Uuid, change: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Transaction),
    {
        let mut candidate = book
            .transaction(id)
            .cloned()
            .ok_or(CoreError::TransactionNotFound(id))?;
        change(&mut candidate);
        candidate.id = id;
        Self::validate(book, &candidate)?;
        if let Some(slot) = book.transaction_mut(id) {
            *slot = candidate;
        }
        info!(%id, "transaction updated");
        Ok(())
    }

    pub fn delete(book: &mut Book, id: Uuid) -> Result<Transaction, CoreError> {
        let index = book
            .transactions
            .iter()
            .position(|txn| txn.id == id)
            .ok_or(CoreError::TransactionNotFound(id))?;
        info!(%id, "transaction deleted");
        Ok(book.transactions.remove(index))
    }

    pub fn get(book: &Book, id: Uuid) -> Result<&Transaction, CoreError> {
        book.transaction(id).ok_or(CoreError::TransactionNotFound(id))
    }

    /// Matching transactions, newest first.
    pub fn query<'a>(book: &'a Book, filter: &TransactionFilter) -> Vec<&'a Transaction> {
        let categories: Option<HashSet<Uuid>> = filter.category_id.map(|id| {
            let mut ids: HashSet<Uuid> = CategoryService::descendants(book, id).into_iter().collect();
            ids.insert(id);
            ids
        });
        let needle = filter
            .search
            .as_deref()
            .map(|text| text.trim().to_lowercase())
            .filter(|text| !text.is_empty());

        let mut matches: Vec<&Transaction> = book
            .transactions
            .iter()
            .filter(|txn| filter.from.map_or(true, |from| txn.date >= from))
            .filter(|txn| filter.to.map_or(true, |to| txn.date <= to))
            .filter(|txn| filter.wallet_id.map_or(true, |id| txn.wallet_id == id))
            .filter(|txn| filter.event_id.map_or(true, |id| txn.event_id == Some(id)))
            .filter(|txn| filter.kind.map_or(true, |kind| txn.kind == kind))
            .filter(|txn| {
                categories
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&txn.category_id))
            })
            .filter(|txn| {
                needle.as_ref().map_or(true, |needle| {
                    txn.description
                        .as_deref()
                        .is_some_and(|text| text.to_lowercase().contains(needle))
                })
            })
            .collect();
        matches.sort_by(|a, b| b.date.cmp(&a.date));
        matches
    }

    /// Checks every rule a stored transaction must satisfy.
    pub fn validate(book: &Book, txn: &Transaction) -> Result<(), CoreError> {
        if !txn.amount.is_finite() || txn.amount <= 0.0 {
            return Err(CoreError::Validation(
                "Amount must be a positive number".into(),
            ));
        }
        let category = book
            .category(txn.category_id)
            .ok_or(CoreError::CategoryNotFound(txn.category_id))?;
        if category.kind != txn.kind {
            return Err(CoreError::Validation(format!(
                "{} transaction cannot use {} category `{}`",
                txn.kind, category.kind, category.name
            )));
        }
        let wallet = book
            .wallet(txn.wallet_id)
            .ok_or(CoreError::WalletNotFound(txn.wallet_id))?;
        if wallet.currency != txn.currency {
            return Err(CoreError::Validation(format!(
                "Transaction currency {} does not match wallet `{}` ({})",
                txn.currency, wallet.name, wallet.currency
            )));
        }
        if wallet.restricts_categories() {
            let mut allowed = CategoryService::ancestors(book, category.id);
            allowed.push(category.id);
            if !allowed
                .iter()
                .any(|id| wallet.linked_category_ids.contains(id))
            {
                return Err(CoreError::Validation(format!(
                    "Category `{}` is not available in wallet `{}`",
                    category.name, wallet.name
                )));
            }
        }
        if let Some(event_id) = txn.event_id {
            if book.event(event_id).is_none() {
                return Err(CoreError::EventNotFound(event_id));
            }
        }
        Ok(())
    }
}

/// Criteria for [`TransactionService::query`]; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub wallet_id: Option<Uuid>,
    /// Matches the category and all of its descendants.
    pub category_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub kind: Option<CategoryKind>,
    pub search: Option<String>,
}

impl TransactionFilter {
    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn wallet(mut self, wallet_id: Uuid) -> Self {
        self.wallet_id = Some(wallet_id);
        self
    }

    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn event(mut self, event_id: Uuid) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn kind(mut self, kind: CategoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }
}
