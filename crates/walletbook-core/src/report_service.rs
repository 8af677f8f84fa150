//! Income/expense reporting. Totals are kept per currency; nothing is converted.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use walletbook_domain::{Book, CategoryKind, CurrencyCode, DateWindow, Transaction};

use crate::{category_service::CategoryService, CoreError};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
/// Aggregated income and expense for one currency.
pub struct Totals {
    pub income: f64,
    pub expense: f64,
}

impl Totals {
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }

    fn record(&mut self, txn: &Transaction) {
        match txn.kind {
            CategoryKind::Income => self.income += txn.amount,
            CategoryKind::Expense => self.expense += txn.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodSummary {
    pub window: DateWindow,
    pub totals: BTreeMap<CurrencyCode, Totals>,
    pub transaction_count: usize,
    /// Transactions inside the window skipped because of `exclude_from_report`.
    pub excluded_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryTotal {
    pub category_id: Uuid,
    pub name: String,
    pub currency: CurrencyCode,
    pub amount: f64,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyBucket {
    pub month: u32,
    pub totals: BTreeMap<CurrencyCode, Totals>,
}

pub struct ReportService;

impl ReportService {
    pub fn summarize(book: &Book, window: DateWindow) -> PeriodSummary {
        let mut totals: BTreeMap<CurrencyCode, Totals> = BTreeMap::new();
        let mut transaction_count = 0;
        let mut excluded_count = 0;
        for txn in book.transactions.iter().filter(|txn| window.contains(txn.date)) {
            if txn.exclude_from_report {
                excluded_count += 1;
                continue;
            }
            transaction_count += 1;
            totals.entry(txn.currency.clone()).or_default().record(txn);
        }
        PeriodSummary {
            window,
            totals,
            transaction_count,
            excluded_count,
        }
    }

    pub fn summarize_month_of(book: &Book, reference: NaiveDate) -> PeriodSummary {
        Self::summarize(book, DateWindow::month_of(reference))
    }

    /// Totals per root category (children roll up), largest first.
    pub fn by_category(book: &Book, window: DateWindow, kind: CategoryKind) -> Vec<CategoryTotal> {
        let mut buckets: HashMap<(Uuid, CurrencyCode), (f64, usize)> = HashMap::new();
        for txn in reportable(book)
            .filter(|txn| txn.kind == kind)
            .filter(|txn| window.contains(txn.date))
        {
            let root = CategoryService::root_of(book, txn.category_id).unwrap_or(txn.category_id);
            let entry = buckets.entry((root, txn.currency.clone())).or_default();
            entry.0 += txn.amount;
            entry.1 += 1;
        }
        let mut rows: Vec<CategoryTotal> = buckets
            .into_iter()
            .map(|((category_id, currency), (amount, transaction_count))| CategoryTotal {
                name: book
                    .category(category_id)
                    .map(|category| category.name.clone())
                    .unwrap_or_else(|| "Uncategorized".into()),
                category_id,
                amount: currency.round(amount),
                currency,
                transaction_count,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        rows
    }

    pub fn by_event(book: &Book, event_id: Uuid) -> Result<BTreeMap<CurrencyCode, Totals>, CoreError> {
        if book.event(event_id).is_none() {
            return Err(CoreError::EventNotFound(event_id));
        }
        let mut totals: BTreeMap<CurrencyCode, Totals> = BTreeMap::new();
        for txn in reportable(book).filter(|txn| txn.event_id == Some(event_id)) {
            totals.entry(txn.currency.clone()).or_default().record(txn);
        }
        Ok(totals)
    }

    /// Twelve buckets (January first) for `year`.
    pub fn monthly_trend(book: &Book, year: i32) -> Vec<MonthlyBucket> {
        let mut buckets: Vec<MonthlyBucket> = (1..=12)
            .map(|month| MonthlyBucket {
                month,
                totals: BTreeMap::new(),
            })
            .collect();
        for txn in reportable(book).filter(|txn| txn.date.year() == year) {
            let bucket = &mut buckets[txn.date.month0() as usize];
            bucket.totals.entry(txn.currency.clone()).or_default().record(txn);
        }
        buckets
    }
}

fn reportable(book: &Book) -> impl Iterator<Item = &Transaction> {
    book.transactions.iter().filter(|txn| !txn.exclude_from_report)
}
