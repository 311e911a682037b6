use super::ui;
use crate::core::ingest::{ImportSummary, ingest};
use crate::core::{Ledger, TransactionEntry, TransactionParser};
use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Records a single transaction, creating the portfolio if needed.
pub async fn add(ledger: &dyn Ledger, portfolio: &str, entry: TransactionEntry) -> Result<()> {
    ledger.create_portfolio(portfolio).await?;
    ledger
        .append(portfolio, std::slice::from_ref(&entry))
        .await
        .with_context(|| format!("Failed to record transaction in {portfolio}"))?;
    println!(
        "Recorded {} {} @ {} on {} in {}",
        entry.quantity,
        entry.symbol.trim().to_uppercase(),
        entry.price,
        entry.date,
        portfolio
    );
    Ok(())
}

async fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read transactions from stdin")?;
            Ok(text)
        }
    }
}

pub fn display_import(summary: &ImportSummary) -> String {
    format!(
        "Imported {} transactions into {}",
        ui::style_text(&summary.count.to_string(), ui::StyleType::TotalValue),
        summary.portfolios.join(", ")
    )
}

pub async fn import(
    parser: &dyn TransactionParser,
    ledger: &dyn Ledger,
    file: Option<&Path>,
    default_portfolio: Option<&str>,
    json: bool,
) -> Result<()> {
    let raw = read_input(file).await?;
    if raw.trim().is_empty() {
        anyhow::bail!("No transaction text given");
    }

    let pb = ui::new_spinner("Extracting transactions...");
    let summary = ingest(parser, ledger, &raw, default_portfolio).await;
    pb.finish_and_clear();
    let summary = summary?;

    if json {
        return ui::print_json(&summary);
    }
    println!("{}", display_import(&summary));
    Ok(())
}

pub async fn list_portfolios(ledger: &dyn Ledger, json: bool) -> Result<()> {
    let names = ledger.portfolios().await?;
    if json {
        return ui::print_json(&names);
    }
    if names.is_empty() {
        println!("{}", ui::style_text("No portfolios yet", ui::StyleType::Subtle));
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
