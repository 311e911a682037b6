//! Portfolio valuation: current status and historical performance.
use super::error::LedgerError;
use super::ledger::{Ledger, aggregate};
use super::resolver::SnapshotResolver;
use super::snapshot::ClosePoint;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Current value of one non-zero position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioStatus {
    pub portfolio: String,
    pub holdings: Vec<Holding>,
    pub total_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformancePoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Values portfolios from their ledger and per-symbol snapshots.
///
/// Nothing derived is kept between calls; every call recomputes from the
/// ledger and whatever the resolver serves.
pub struct Valuation {
    ledger: Arc<dyn Ledger>,
    resolver: Arc<SnapshotResolver>,
    max_age: Duration,
}

impl Valuation {
    pub fn new(ledger: Arc<dyn Ledger>, resolver: Arc<SnapshotResolver>, max_age: Duration) -> Self {
        Self {
            ledger,
            resolver,
            max_age,
        }
    }

    /// Holdings at current prices. A symbol whose snapshot cannot be
    /// resolved is reported with a zero price rather than failing the call.
    pub async fn status(&self, portfolio: &str) -> Result<PortfolioStatus, LedgerError> {
        let transactions = self.ledger.transactions_for(portfolio).await?;
        let positions = aggregate(&transactions);

        let mut holdings = Vec::new();
        let mut total_value = 0.0;
        for (symbol, quantity) in positions.iter() {
            if quantity == 0.0 {
                continue;
            }
            let price = match self.resolver.resolve(symbol, self.max_age).await {
                Ok((snapshot, origin)) => {
                    debug!("Price for {symbol} resolved from {origin}");
                    snapshot.current_price().unwrap_or_else(|| {
                        warn!("Snapshot for {symbol} has no current price");
                        0.0
                    })
                }
                Err(e) => {
                    warn!("Price unavailable for {symbol}: {e}");
                    0.0
                }
            };
            let value = price * quantity;
            total_value += value;
            holdings.push(Holding {
                symbol: symbol.to_string(),
                quantity,
                price,
                value,
            });
        }

        Ok(PortfolioStatus {
            portfolio: portfolio.to_string(),
            holdings,
            total_value,
        })
    }

    /// Daily portfolio value since the earliest transaction, using each
    /// symbol's close prices carried forward over missing dates.
    pub async fn performance(&self, portfolio: &str) -> Result<Vec<PerformancePoint>, LedgerError> {
        let transactions = self.ledger.transactions_for(portfolio).await?;
        let Some(first_date) = transactions.iter().map(|t| t.date).min() else {
            return Ok(Vec::new());
        };
        let positions = aggregate(&transactions);

        let mut series = Vec::new();
        for (symbol, quantity) in positions.iter() {
            if quantity == 0.0 {
                continue;
            }
            let snapshot = match self.resolver.resolve(symbol, self.max_age).await {
                Ok((snapshot, _)) => snapshot,
                Err(e) => {
                    warn!("No history for {symbol}: {e}");
                    continue;
                }
            };
            match snapshot.close_series(symbol) {
                Ok(closes) if closes.is_empty() => debug!("Empty history for {symbol}"),
                Ok(closes) => series.push((quantity, closes)),
                Err(e) => warn!("Skipping {symbol}: {e}"),
            }
        }

        Ok(value_series(first_date, &series))
    }
}

/// Aligns per-symbol close series on the union of their dates from
/// `first_date` onwards and sums `close * quantity` per date.
///
/// A symbol contributes nothing before its first close on or after
/// `first_date`; after that its last close is carried forward.
pub fn value_series(first_date: NaiveDate, series: &[(f64, Vec<ClosePoint>)]) -> Vec<PerformancePoint> {
    let truncated: Vec<(f64, &[ClosePoint])> = series
        .iter()
        .map(|(quantity, closes)| {
            let start = closes.partition_point(|p| p.date < first_date);
            (*quantity, &closes[start..])
        })
        .filter(|(_, closes)| !closes.is_empty())
        .collect();

    let dates: BTreeSet<NaiveDate> = truncated
        .iter()
        .flat_map(|(_, closes)| closes.iter().map(|p| p.date))
        .collect();

    let mut cursors = vec![0usize; truncated.len()];
    let mut last_close: Vec<Option<f64>> = vec![None; truncated.len()];

    dates
        .into_iter()
        .map(|date| {
            let mut value = 0.0;
            for (i, (quantity, closes)) in truncated.iter().enumerate() {
                while cursors[i] < closes.len() && closes[cursors[i]].date <= date {
                    last_close[i] = Some(closes[cursors[i]].close);
                    cursors[i] += 1;
                }
                if let Some(close) = last_close[i] {
                    value += close * quantity;
                }
            }
            PerformancePoint { date, value }
        })
        .collect()
}
