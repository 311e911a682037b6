//! Transaction ledger abstractions and position aggregation

use super::error::LedgerError;
use super::snapshot::normalize_symbol;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A transaction as submitted, before it is recorded in a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEntry {
    #[serde(alias = "ticker")]
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TransactionEntry {
    /// Returns a copy with a normalised symbol and an empty label dropped.
    pub fn validated(&self) -> Result<TransactionEntry, LedgerError> {
        let symbol = normalize_symbol(&self.symbol)
            .map_err(|_| LedgerError::InvalidTransaction("symbol is empty".to_string()))?;
        if !self.quantity.is_finite() {
            return Err(LedgerError::InvalidTransaction(format!(
                "quantity for {symbol} is not a number"
            )));
        }
        if !self.price.is_finite() {
            return Err(LedgerError::InvalidTransaction(format!(
                "price for {symbol} is not a number"
            )));
        }
        Ok(TransactionEntry {
            symbol,
            quantity: self.quantity,
            price: self.price,
            date: self.date,
            label: self.label.clone().filter(|l| !l.trim().is_empty()),
        })
    }
}

/// A recorded, immutable transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Insertion order within the portfolio.
    pub sequence: u64,
    pub portfolio: String,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Transaction {
    pub fn record(sequence: u64, portfolio: &str, entry: TransactionEntry) -> Self {
        Self {
            sequence,
            portfolio: portfolio.to_string(),
            symbol: entry.symbol,
            quantity: entry.quantity,
            price: entry.price,
            date: entry.date,
            label: entry.label,
        }
    }
}

pub fn validate_portfolio_name(name: &str) -> Result<String, LedgerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        return Err(LedgerError::InvalidPortfolioName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Orders transactions by date, ties broken by insertion sequence.
pub fn sort_ledger(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| a.date.cmp(&b.date).then(a.sequence.cmp(&b.sequence)));
}

/// Append-only, per-portfolio transaction storage.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Creates the portfolio if it does not exist yet.
    async fn create_portfolio(&self, name: &str) -> Result<(), LedgerError>;

    async fn portfolios(&self) -> Result<Vec<String>, LedgerError>;

    /// Validates every entry, then records all of them or none.
    async fn append(&self, portfolio: &str, entries: &[TransactionEntry])
    -> Result<usize, LedgerError>;

    /// Transactions ordered by date ascending, ties by insertion order.
    async fn transactions_for(&self, portfolio: &str) -> Result<Vec<Transaction>, LedgerError>;
}

/// Net quantity per symbol, iterated in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct Positions {
    entries: Vec<(String, f64)>,
    index: HashMap<String, usize>,
}

impl Positions {
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.index.get(symbol).map(|&i| self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(s, q)| (s.as_str(), *q))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add(&mut self, symbol: &str, quantity: f64) {
        match self.index.get(symbol) {
            Some(&i) => self.entries[i].1 += quantity,
            None => {
                self.index.insert(symbol.to_string(), self.entries.len());
                self.entries.push((symbol.to_string(), quantity));
            }
        }
    }
}

/// Equality as mappings; iteration order is not compared.
impl PartialEq for Positions {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(s, q)| other.get(s) == Some(q))
    }
}

/// Sums signed quantities per symbol. Zero positions are kept.
pub fn aggregate(transactions: &[Transaction]) -> Positions {
    let mut positions = Positions::default();
    for tx in transactions {
        positions.add(&tx.symbol, tx.quantity);
    }
    positions
}
