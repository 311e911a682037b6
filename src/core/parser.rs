//! Free-text transaction parsing abstraction

use super::error::ParseError;
use super::ledger::TransactionEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A transaction extracted from free text, optionally naming its portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
    #[serde(flatten)]
    pub entry: TransactionEntry,
}

#[async_trait]
pub trait TransactionParser: Send + Sync {
    async fn parse(&self, raw_text: &str) -> Result<Vec<ParsedTransaction>, ParseError>;
}
