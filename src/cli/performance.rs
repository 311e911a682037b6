use super::ui;
use crate::core::{PerformancePoint, Valuation};
use anyhow::{Context, Result};
use comfy_table::Cell;

pub fn display_as_table(portfolio: &str, points: &[PerformancePoint]) -> String {
    let mut output = format!(
        "Performance: {}\n\n",
        ui::style_text(portfolio, ui::StyleType::Title)
    );
    let Some(first) = points.first() else {
        output.push_str(&ui::style_text(
            "No price history available",
            ui::StyleType::Subtle,
        ));
        return output;
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Value"),
        ui::header_cell("Change"),
    ]);
    for point in points {
        let change = (first.value != 0.0).then(|| (point.value - first.value) / first.value * 100.0);
        table.add_row(vec![
            Cell::new(point.date.format("%Y-%m-%d")),
            ui::number_cell(point.value),
            change.map_or_else(|| Cell::new(""), ui::change_cell),
        ]);
    }
    output.push_str(&table.to_string());
    output
}

pub async fn run(valuation: &Valuation, portfolio: &str, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Computing performance...");
    let points = valuation.performance(portfolio).await;
    pb.finish_and_clear();
    let points = points.with_context(|| format!("Failed to compute performance for {portfolio}"))?;

    if json {
        return ui::print_json(&points);
    }
    println!("{}", display_as_table(portfolio, &points));
    Ok(())
}
