use super::ui;
use crate::core::{PortfolioStatus, Valuation};
use anyhow::{Context, Result};
use comfy_table::Cell;

impl PortfolioStatus {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();

        table.set_header(vec![
            ui::header_cell("Symbol"),
            ui::header_cell("Quantity"),
            ui::header_cell("Price"),
            ui::header_cell("Value"),
            ui::header_cell("Weight (%)"),
        ]);

        for holding in &self.holdings {
            let weight = (self.total_value != 0.0).then(|| holding.value / self.total_value * 100.0);
            let price = if holding.price == 0.0 {
                Cell::new(ui::style_text("N/A", ui::StyleType::Error))
            } else {
                ui::number_cell(holding.price)
            };
            table.add_row(vec![
                Cell::new(&holding.symbol),
                ui::number_cell(holding.quantity),
                price,
                ui::number_cell(holding.value),
                ui::format_optional_cell(weight, |w| format!("{w:.2}%")),
            ]);
        }

        let mut output = format!(
            "Portfolio: {}\n\n",
            ui::style_text(&self.portfolio, ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\n{}: {}",
            ui::style_text("Total Value", ui::StyleType::TotalLabel),
            ui::style_text(&format!("{:.2}", self.total_value), ui::StyleType::TotalValue)
        ));
        output
    }
}

pub async fn run(valuation: &Valuation, portfolio: &str, json: bool) -> Result<()> {
    let pb = ui::new_spinner("Valuing holdings...");
    let status = valuation.status(portfolio).await;
    pb.finish_and_clear();
    let status = status.with_context(|| format!("Failed to value portfolio {portfolio}"))?;

    if json {
        return ui::print_json(&status);
    }
    println!("{}", status.display_as_table());
    Ok(())
}
