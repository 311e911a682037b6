use super::ui;
use crate::core::{MarketDataError, Origin, Snapshot, SnapshotResolver};
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct QuoteRow {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Origin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Snapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuoteRow {
    fn from_result(symbol: &str, result: Result<(Snapshot, Origin), MarketDataError>) -> Self {
        let symbol = symbol.trim().to_uppercase();
        match result {
            Ok((snapshot, origin)) => QuoteRow {
                symbol,
                source: Some(origin),
                data: Some(snapshot),
                error: None,
            },
            Err(e) => QuoteRow {
                symbol,
                source: None,
                data: None,
                error: Some(e.to_string()),
            },
        }
    }
}

pub fn display_as_table(rows: &[QuoteRow]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Name"),
        ui::header_cell("Price"),
        ui::header_cell("Bars"),
        ui::header_cell("Source"),
    ]);

    for row in rows {
        match (&row.data, &row.error) {
            (Some(snapshot), _) => {
                let currency = snapshot.currency().unwrap_or("");
                table.add_row(vec![
                    Cell::new(&row.symbol),
                    Cell::new(snapshot.display_name().unwrap_or("")),
                    ui::format_optional_cell(snapshot.current_price(), |p| {
                        format!("{p:.2} {currency}")
                    }),
                    Cell::new(snapshot.history.len()),
                    Cell::new(row.source.map(|o| o.to_string()).unwrap_or_default()),
                ]);
            }
            (None, error) => {
                table.add_row(vec![
                    Cell::new(&row.symbol),
                    Cell::new(ui::style_text(
                        error.as_deref().unwrap_or("unavailable"),
                        ui::StyleType::Error,
                    )),
                    ui::format_optional_cell(None::<f64>, |p| p.to_string()),
                    Cell::new(""),
                    Cell::new(""),
                ]);
            }
        }
    }
    table.to_string()
}

/// Resolves every symbol; each one is an independent request.
pub async fn run(
    resolver: &SnapshotResolver,
    symbols: &[String],
    max_age: Duration,
    json: bool,
) -> Result<()> {
    let pb = ui::new_progress_bar(symbols.len() as u64);
    pb.set_message("Fetching quotes...");

    let futures = symbols.iter().map(|symbol| {
        let pb = pb.clone();
        async move {
            let result = resolver.resolve(symbol, max_age).await;
            pb.inc(1);
            QuoteRow::from_result(symbol, result)
        }
    });
    let rows = join_all(futures).await;
    pb.finish_and_clear();

    if json {
        return ui::print_json(&rows);
    }
    println!("{}", display_as_table(&rows));
    Ok(())
}
