use tracing::info;
use uuid::Uuid;
use walletbook_domain::{Book, Category, CurrencyCode, Wallet};

use crate::{category_service::CategoryService, CoreError};

pub struct WalletService;

impl WalletService {
    pub fn add(book: &mut Book, mut wallet: Wallet) -> Result<Uuid, CoreError> {
        wallet.name = Self::validate_name(book, None, &wallet.name)?;
        ensure_currency(&wallet.currency)?;
        ensure_finite(wallet.balance)?;
        Self::ensure_categories_exist(book, &wallet.linked_category_ids)?;
        let id = wallet.id;
        info!(wallet = %wallet.name, currency = %wallet.currency, "wallet added");
        book.wallets.push(wallet);
        Ok(id)
    }

    pub fn rename(book: &mut Book, id: Uuid, name: &str) -> Result<(), CoreError> {
        let name = Self::validate_name(book, Some(id), name)?;
        let wallet = book.wallet_mut(id).ok_or(CoreError::WalletNotFound(id))?;
        wallet.name = name;
        Ok(())
    }

    pub fn set_base_balance(book: &mut Book, id: Uuid, balance: f64) -> Result<(), CoreError> {
        ensure_finite(balance)?;
        let wallet = book.wallet_mut(id).ok_or(CoreError::WalletNotFound(id))?;
        wallet.balance = balance;
        Ok(())
    }

    /// Changes the wallet currency; only allowed while no transaction uses the wallet.
    pub fn set_currency(book: &mut Book, id: Uuid, currency: CurrencyCode) -> Result<(), CoreError> {
        ensure_currency(&currency)?;
        if book.wallet(id).is_none() {
            return Err(CoreError::WalletNotFound(id));
        }
        if book.transactions.iter().any(|txn| txn.wallet_id == id) {
            return Err(CoreError::Validation(
                "Wallet currency cannot change while it has transactions; migrate currencies instead"
                    .into(),
            ));
        }
        if let Some(wallet) = book.wallet_mut(id) {
            wallet.currency = currency;
        }
        Ok(())
    }

    pub fn delete(book: &mut Book, id: Uuid) -> Result<(), CoreError> {
        let used = book.transactions.iter().filter(|txn| txn.wallet_id == id).count();
        if used > 0 {
            return Err(CoreError::Validation(format!(
                "Wallet is used by {} transaction(s) and cannot be deleted",
                used
            )));
        }
        let before = book.wallets.len();
        book.wallets.retain(|wallet| wallet.id != id);
        if book.wallets.len() == before {
            return Err(CoreError::WalletNotFound(id));
        }
        info!(%id, "wallet deleted");
        Ok(())
    }

    /// Replaces the set of categories selectable in this wallet. Empty clears the restriction.
    pub fn link_categories(
        book: &mut Book,
        id: Uuid,
        category_ids: Vec<Uuid>,
    ) -> Result<(), CoreError> {
        Self::ensure_categories_exist(book, &category_ids)?;
        let wallet = book.wallet_mut(id).ok_or(CoreError::WalletNotFound(id))?;
        let mut deduped = Vec::with_capacity(category_ids.len());
        for category_id in category_ids {
            if !deduped.contains(&category_id) {
                deduped.push(category_id);
            }
        }
        wallet.linked_category_ids = deduped;
        Ok(())
    }

    /// Categories a transaction in this wallet may use: linked ones plus their descendants.
    pub fn selectable_categories(book: &Book, id: Uuid) -> Result<Vec<&Category>, CoreError> {
        let wallet = book.wallet(id).ok_or(CoreError::WalletNotFound(id))?;
        if !wallet.restricts_categories() {
            return Ok(book.categories.iter().collect());
        }
        let mut allowed: Vec<Uuid> = Vec::new();
        for linked in &wallet.linked_category_ids {
            allowed.push(*linked);
            allowed.extend(CategoryService::descendants(book, *linked));
        }
        Ok(book
            .categories
            .iter()
            .filter(|category| allowed.contains(&category.id))
            .collect())
    }

    /// Base balance plus every signed transaction amount in the wallet.
    pub fn balance(book: &Book, id: Uuid) -> Result<f64, CoreError> {
        let wallet = book.wallet(id).ok_or(CoreError::WalletNotFound(id))?;
        let movement: f64 = book
            .transactions
            .iter()
            .filter(|txn| txn.wallet_id == id)
            .map(|txn| txn.signed_amount())
            .sum();
        Ok(wallet.currency.round(wallet.balance + movement))
    }

    fn validate_name(book: &Book, exclude: Option<Uuid>, candidate: &str) -> Result<String, CoreError> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("Wallet name is required".into()));
        }
        let duplicate = book.wallets.iter().any(|wallet| {
            wallet.name.trim().eq_ignore_ascii_case(trimmed) && exclude.map_or(true, |id| wallet.id != id)
        });
        if duplicate {
            return Err(CoreError::Validation(format!(
                "Wallet `{}` already exists",
                trimmed
            )));
        }
        Ok(trimmed.to_string())
    }

    fn ensure_categories_exist(book: &Book, ids: &[Uuid]) -> Result<(), CoreError> {
        match ids.iter().find(|id| book.category(**id).is_none()) {
            Some(missing) => Err(CoreError::CategoryNotFound(*missing)),
            None => Ok(()),
        }
    }
}

fn ensure_currency(currency: &CurrencyCode) -> Result<(), CoreError> {
    if currency.is_valid() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "`{}` is not a three-letter currency code",
            currency
        )))
    }
}

fn ensure_finite(balance: f64) -> Result<(), CoreError> {
    if balance.is_finite() {
        Ok(())
    } else {
        Err(CoreError::Validation("Balance must be a number".into()))
    }
}
