use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

use crate::core::error::MarketDataError;
use crate::core::fetcher::SnapshotFetcher;
use crate::core::snapshot::{HistoryBar, PRICE_FIELD, Snapshot};

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: Map<String, Value>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
    events: Option<ChartEvents>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartEvents {
    dividends: Option<HashMap<String, Dividend>>,
    splits: Option<HashMap<String, Split>>,
}

#[derive(Deserialize, Debug)]
struct Dividend {
    amount: f64,
    date: i64,
}

#[derive(Deserialize, Debug)]
struct Split {
    date: i64,
    numerator: f64,
    denominator: f64,
    #[serde(alias = "splitRatio")]
    split_ratio: Option<String>,
}

fn local_date(ts: i64, gmt_offset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts + gmt_offset, 0).map(|dt| dt.date_naive())
}

fn column(values: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    values.as_ref().and_then(|v| v.get(i).copied().flatten())
}

/// One bar per exchange-local day. Bars without a close are dropped and a
/// repeated date keeps the later bar.
fn extract_history(item: &ChartItem, gmt_offset: i64) -> Vec<HistoryBar> {
    let Some(timestamps) = item.timestamp.as_ref() else {
        return Vec::new();
    };
    let default_quote = Quote::default();
    let quote = item
        .indicators
        .as_ref()
        .and_then(|inds| inds.quote.first())
        .unwrap_or(&default_quote);

    let mut bars = BTreeMap::new();
    for (i, ts) in timestamps.iter().enumerate() {
        let (Some(date), Some(close)) = (local_date(*ts, gmt_offset), column(&quote.close, i))
        else {
            continue;
        };
        bars.insert(
            date,
            HistoryBar {
                date: date.format("%Y-%m-%d").to_string(),
                open: column(&quote.open, i),
                high: column(&quote.high, i),
                low: column(&quote.low, i),
                close: Some(close),
                volume: column(&quote.volume, i),
            },
        );
    }
    bars.into_values().collect()
}

fn extract_events(events: &ChartEvents, gmt_offset: i64) -> Option<Value> {
    let format_date = |ts: i64| local_date(ts, gmt_offset).map(|d| d.format("%Y-%m-%d").to_string());

    let mut dividends: Vec<&Dividend> = events.dividends.iter().flat_map(|m| m.values()).collect();
    dividends.sort_by_key(|d| d.date);
    let mut splits: Vec<&Split> = events.splits.iter().flat_map(|m| m.values()).collect();
    splits.sort_by_key(|s| s.date);

    if dividends.is_empty() && splits.is_empty() {
        return None;
    }
    Some(json!({
        "dividends": dividends
            .iter()
            .map(|d| json!({"date": format_date(d.date), "amount": d.amount}))
            .collect::<Vec<_>>(),
        "splits": splits
            .iter()
            .map(|s| json!({
                "date": format_date(s.date),
                "numerator": s.numerator,
                "denominator": s.denominator,
                "ratio": s.split_ratio,
            }))
            .collect::<Vec<_>>(),
    }))
}

/// Snapshot fetcher backed by the Yahoo Finance chart API.
pub struct YahooSnapshotFetcher {
    base_url: String,
    range: String,
    client: reqwest::Client,
}

impl YahooSnapshotFetcher {
    pub fn new(base_url: &str, range: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tickerfolio/1.0")
            .build()?;
        Ok(YahooSnapshotFetcher {
            base_url: base_url.trim_end_matches('/').to_string(),
            range: range.to_string(),
            client,
        })
    }

    /// Chart endpoint for `symbol`, encoded as a single path segment.
    fn chart_url(&self, symbol: &str) -> Result<Url, MarketDataError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MarketDataError::unavailable(symbol, format!("Invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| MarketDataError::unavailable(symbol, "Base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        url.query_pairs_mut()
            .append_pair("interval", "1d")
            .append_pair("range", &self.range)
            .append_pair("events", "div,splits");
        Ok(url)
    }

    fn build_snapshot(symbol: &str, item: ChartItem) -> Result<Snapshot, MarketDataError> {
        let has_name = ["shortName", "longName"].iter().any(|field| {
            item.meta
                .get(*field)
                .and_then(Value::as_str)
                .is_some_and(|name| !name.trim().is_empty())
        });
        if !has_name {
            debug!("No display name in quote for {symbol}");
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        if item.meta.get(PRICE_FIELD).and_then(Value::as_f64).is_none() {
            return Err(MarketDataError::unavailable(
                symbol,
                format!("response has no {PRICE_FIELD}"),
            ));
        }

        let gmt_offset = item.meta.get("gmtoffset").and_then(Value::as_i64).unwrap_or(0);
        let history = extract_history(&item, gmt_offset);
        let events = item
            .events
            .as_ref()
            .and_then(|events| extract_events(events, gmt_offset));

        Ok(Snapshot {
            info: item.meta,
            history,
            events,
        })
    }
}

#[async_trait]
impl SnapshotFetcher for YahooSnapshotFetcher {
    #[instrument(
        name = "YahooSnapshotFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch(&self, symbol: &str) -> Result<Snapshot, MarketDataError> {
        let url = self.chart_url(symbol)?;
        debug!("Requesting chart data from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MarketDataError::unavailable(symbol, format!("Request error: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(MarketDataError::unavailable(
                symbol,
                format!("HTTP error: {status}"),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| MarketDataError::unavailable(symbol, format!("Body error: {e}")))?;
        let data: YahooChartResponse = serde_json::from_str(&text).map_err(|e| {
            MarketDataError::unavailable(symbol, format!("Failed to parse JSON response: {e}"))
        })?;

        if let Some(error) = data.chart.error {
            return Err(if error.code == "Not Found" {
                MarketDataError::SymbolNotFound(symbol.to_string())
            } else {
                MarketDataError::unavailable(
                    symbol,
                    format!(
                        "{}: {}",
                        error.code,
                        error.description.unwrap_or_default()
                    ),
                )
            });
        }

        let item = data
            .chart
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let snapshot = Self::build_snapshot(symbol, item)?;
        debug!(
            bars = snapshot.history.len(),
            "Received Yahoo chart for {symbol}"
        );
        Ok(snapshot)
    }
}
