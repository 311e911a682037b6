//! Error types for market data, ledger and parsing operations

use thiserror::Error;

/// Failures resolving market data for a symbol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Invalid symbol: '{0}'")]
    InvalidSymbol(String),

    /// The instrument does not exist at the data source. Not worth retrying.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The data source could not be reached or answered unusably.
    #[error("Market data unavailable for {symbol}: {message}")]
    FetchUnavailable { symbol: String, message: String },

    #[error("Malformed history for {symbol}: {reason}")]
    MalformedHistory { symbol: String, reason: String },
}

impl MarketDataError {
    pub fn unavailable(symbol: &str, message: impl Into<String>) -> Self {
        MarketDataError::FetchUnavailable {
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Unknown portfolio: {0}")]
    UnknownPortfolio(String),

    #[error("Invalid portfolio name: '{0}'")]
    InvalidPortfolioName(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Ledger storage error: {0}")]
    Storage(String),
}

/// Failures turning free text into transactions.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parser request failed: {0}")]
    Request(String),

    #[error("Parser returned an invalid response: {0}")]
    InvalidResponse(String),
}
