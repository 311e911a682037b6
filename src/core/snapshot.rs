//! Market data snapshot types

use super::error::MarketDataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Display;

/// Quote field holding the current market price.
pub const PRICE_FIELD: &str = "regularMarketPrice";

const NAME_FIELDS: [&str; 2] = ["shortName", "longName"];

/// Where a resolved snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Origin {
    Cache,
    Live,
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Origin::Cache => "CACHE",
                Origin::Live => "LIVE",
            }
        )
    }
}

/// Trims and uppercases a symbol, rejecting empty input.
pub fn normalize_symbol(symbol: &str) -> Result<String, MarketDataError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(MarketDataError::InvalidSymbol(symbol.to_string()));
    }
    Ok(symbol.to_uppercase())
}

/// One daily bar as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBar {
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl HistoryBar {
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: None,
        }
    }
}

/// A validated `(date, close)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Point-in-time market data for one symbol: quote fields, daily history and
/// corporate actions. Stored whole and never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub info: Map<String, Value>,
    #[serde(default)]
    pub history: Vec<HistoryBar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,
}

impl Snapshot {
    pub fn current_price(&self) -> Option<f64> {
        self.info.get(PRICE_FIELD).and_then(Value::as_f64)
    }

    pub fn display_name(&self) -> Option<&str> {
        NAME_FIELDS
            .iter()
            .filter_map(|field| self.info.get(*field).and_then(Value::as_str))
            .find(|name| !name.trim().is_empty())
    }

    pub fn currency(&self) -> Option<&str> {
        self.info.get("currency").and_then(Value::as_str)
    }

    /// Interprets the stored history as an ascending close-price series.
    ///
    /// Every bar needs an ISO date and a finite close, and dates must be
    /// strictly increasing. An empty history yields an empty series.
    pub fn close_series(&self, symbol: &str) -> Result<Vec<ClosePoint>, MarketDataError> {
        let malformed = |reason: String| MarketDataError::MalformedHistory {
            symbol: symbol.to_string(),
            reason,
        };

        let mut series: Vec<ClosePoint> = Vec::with_capacity(self.history.len());
        for bar in &self.history {
            let date = NaiveDate::parse_from_str(&bar.date, "%Y-%m-%d")
                .map_err(|e| malformed(format!("bad date '{}': {e}", bar.date)))?;
            let close = bar
                .close
                .filter(|c| c.is_finite())
                .ok_or_else(|| malformed(format!("no usable close on {date}")))?;
            if let Some(prev) = series.last() {
                if prev.date >= date {
                    return Err(malformed(format!("{date} is not after {}", prev.date)));
                }
            }
            series.push(ClosePoint { date, close });
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with(history: Vec<HistoryBar>) -> Snapshot {
        let info = json!({"shortName": "Acme", "regularMarketPrice": 5.0});
        Snapshot {
            info: info.as_object().cloned().unwrap(),
            history,
            events: None,
        }
    }

    fn bar(date: &str, close: Option<f64>) -> HistoryBar {
        HistoryBar {
            date: date.to_string(),
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert!(matches!(
            normalize_symbol("   "),
            Err(MarketDataError::InvalidSymbol(_))
        ));
    }

    #[test]
    fn test_quote_accessors() {
        let snapshot = snapshot_with(vec![]);
        assert_eq!(snapshot.current_price(), Some(5.0));
        assert_eq!(snapshot.display_name(), Some("Acme"));
        assert_eq!(snapshot.currency(), None);
    }

    #[test]
    fn test_close_series_valid() {
        let snapshot = snapshot_with(vec![
            bar("2020-01-01", Some(1.0)),
            bar("2020-01-03", Some(2.0)),
        ]);
        let series = snapshot.close_series("AAA").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].date, NaiveDate::from_ymd_opt(2020, 1, 3).unwrap());
        assert_eq!(series[1].close, 2.0);
    }

    #[test]
    fn test_close_series_empty_is_ok() {
        assert!(snapshot_with(vec![]).close_series("AAA").unwrap().is_empty());
    }

    #[test]
    fn test_close_series_rejects_malformed() {
        let cases = vec![
            vec![bar("01/02/2020", Some(1.0))],
            vec![bar("2020-01-01", None)],
            vec![bar("2020-01-01", Some(f64::NAN))],
            vec![bar("2020-01-02", Some(1.0)), bar("2020-01-01", Some(1.0))],
            vec![bar("2020-01-01", Some(1.0)), bar("2020-01-01", Some(2.0))],
        ];
        for history in cases {
            let result = snapshot_with(history).close_series("AAA");
            assert!(
                matches!(result, Err(MarketDataError::MalformedHistory { .. })),
                "expected malformed history, got {result:?}"
            );
        }
    }

    #[test]
    fn test_origin_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Origin::Cache).unwrap(), "\"CACHE\"");
        assert_eq!(Origin::Live.to_string(), "LIVE");
    }
}
