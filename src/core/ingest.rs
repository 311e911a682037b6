//! Turns raw transaction text into ledger records.

use super::error::LedgerError;
use super::ledger::{Ledger, TransactionEntry, validate_portfolio_name};
use super::parser::TransactionParser;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub count: usize,
    pub portfolios: Vec<String>,
}

/// Parses `raw_text` and appends the transactions to their portfolios.
///
/// Items without a portfolio go to `default_portfolio`. Portfolios are
/// created on demand. Nothing is written when parsing or validation fails.
pub async fn ingest(
    parser: &dyn TransactionParser,
    ledger: &dyn Ledger,
    raw_text: &str,
    default_portfolio: Option<&str>,
) -> Result<ImportSummary> {
    let parsed = parser
        .parse(raw_text)
        .await
        .context("Failed to parse transactions")?;

    let mut groups: Vec<(String, Vec<TransactionEntry>)> = Vec::new();
    for item in parsed {
        let name = item
            .portfolio
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or(default_portfolio)
            .ok_or_else(|| {
                LedgerError::InvalidTransaction(format!(
                    "no portfolio given for {} on {}",
                    item.entry.symbol, item.entry.date
                ))
            })?;
        let name = validate_portfolio_name(name)?;
        let entry = item.entry.validated()?;

        match groups.iter_mut().find(|(p, _)| *p == name) {
            Some((_, entries)) => entries.push(entry),
            None => groups.push((name, vec![entry])),
        }
    }

    let mut count = 0;
    for (portfolio, entries) in &groups {
        ledger.create_portfolio(portfolio).await?;
        count += ledger
            .append(portfolio, entries)
            .await
            .with_context(|| format!("Failed to save transactions for {portfolio}"))?;
    }
    info!("Imported {count} transactions into {} portfolios", groups.len());

    Ok(ImportSummary {
        count,
        portfolios: groups.into_iter().map(|(p, _)| p).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ParseError;
    use crate::core::parser::ParsedTransaction;
    use crate::store::memory::MemoryLedger;
    use async_trait::async_trait;

    struct FixedParser(Result<Vec<ParsedTransaction>, String>);

    #[async_trait]
    impl TransactionParser for FixedParser {
        async fn parse(&self, _raw_text: &str) -> Result<Vec<ParsedTransaction>, ParseError> {
            self.0.clone().map_err(ParseError::InvalidResponse)
        }
    }

    fn parsed(portfolio: Option<&str>, symbol: &str, quantity: f64) -> ParsedTransaction {
        ParsedTransaction {
            portfolio: portfolio.map(str::to_string),
            entry: TransactionEntry {
                symbol: symbol.to_string(),
                quantity,
                price: 10.0,
                date: "2020-01-01".parse().unwrap(),
                label: Some("lab".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_ingest_groups_by_portfolio() {
        let parser = FixedParser(Ok(vec![
            parsed(Some("p1"), "aaa", 1.0),
            parsed(None, "BBB", 2.0),
            parsed(Some("p1"), "CCC", 3.0),
        ]));
        let ledger = MemoryLedger::new();

        let summary = ingest(&parser, &ledger, "text", Some("main")).await.unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.portfolios, vec!["p1".to_string(), "main".to_string()]);

        let p1 = ledger.transactions_for("p1").await.unwrap();
        assert_eq!(p1.len(), 2);
        assert_eq!(p1[0].symbol, "AAA");
        assert_eq!(p1[0].label.as_deref(), Some("lab"));
        assert_eq!(ledger.transactions_for("main").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_without_portfolio_writes_nothing() {
        let parser = FixedParser(Ok(vec![parsed(Some("p1"), "AAA", 1.0), parsed(None, "BBB", 2.0)]));
        let ledger = MemoryLedger::new();

        let result = ingest(&parser, &ledger, "text", None).await;
        assert!(result.is_err());
        assert!(ledger.portfolios().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_parser_failure() {
        let parser = FixedParser(Err("not json".to_string()));
        let ledger = MemoryLedger::new();

        let err = ingest(&parser, &ledger, "text", Some("main")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse transactions"));
        assert!(ledger.portfolios().await.unwrap().is_empty());
    }
}
