//! HTTP client for the two quote providers.
//!
//! Provider A is an Alpha-Vantage-style JSON API (`GLOBAL_QUOTE` plus the
//! `TIME_SERIES_*` functions); provider B is a Yahoo-Finance-style chart API
//! behind a RapidAPI gateway. Every payload is parsed into an explicit serde
//! type and classified as ok / empty / rate-limited / error before anything
//! else looks at it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::config::MarketDataConfig;
use crate::error::MarketDataError;
use crate::market_data::timeframe::Timeframe;
use crate::types::stock::HistoricalQuote;

const RAPIDAPI_HOST: &str = "apidojo-yahoo-finance-v1.p.rapidapi.com";

/// A successfully parsed current quote, before it is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshQuote {
    pub price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
}

/// Map domestic tickers to their venue-qualified provider form. Unmapped
/// symbols pass through unchanged.
pub fn format_symbol(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    match upper.as_str() {
        "RELIANCE" | "TCS" | "INFY" | "HDFC" | "WIPRO" | "ITC" | "SBIN" | "TATAMOTORS"
        | "HCLTECH" => format!("{upper}.BSE"),
        _ => upper,
    }
}

pub struct QuoteClient {
    http: reqwest::Client,
    config: MarketDataConfig,
}

impl QuoteClient {
    pub fn new(config: MarketDataConfig) -> Result<Self, MarketDataError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Fetch the current quote: provider A first, provider B on any failure.
    /// The database-backed cache fallback lives in the caller.
    pub async fn fetch_quote(&self, symbol: &str) -> Result<FreshQuote, MarketDataError> {
        let formatted = format_symbol(symbol);
        match self.fetch_alpha_quote(&formatted).await {
            Ok(quote) => Ok(quote),
            Err(err) => {
                tracing::warn!(symbol = %formatted, error = %err, "primary quote provider failed, trying secondary");
                self.fetch_yahoo_quote(&formatted).await
            }
        }
    }

    /// Fetch a historical series, newest first, truncated to the timeframe's
    /// point count. Same A-then-B fallback as `fetch_quote`.
    pub async fn fetch_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<HistoricalQuote>, MarketDataError> {
        let formatted = format_symbol(symbol);
        match self.fetch_alpha_history(&formatted, timeframe).await {
            Ok(series) => Ok(series),
            Err(err) => {
                tracing::warn!(symbol = %formatted, error = %err, "primary history provider failed, trying secondary");
                self.fetch_yahoo_history(&formatted, timeframe).await
            }
        }
    }

    async fn fetch_alpha_quote(&self, symbol: &str) -> Result<FreshQuote, MarketDataError> {
        let response = self
            .http
            .get(&self.config.alpha_vantage_base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", self.config.alpha_vantage_api_key.as_str()),
            ])
            .send()
            .await?;
        let envelope: AlphaQuoteEnvelope = response
            .json()
            .await
            .map_err(|e| MarketDataError::Decode(e.to_string()))?;

        envelope.classify(symbol)?;
        let quote = envelope
            .global_quote
            .ok_or_else(|| MarketDataError::Empty(symbol.to_string()))?;
        // A missing or unparseable price makes the whole payload unusable;
        // treating it as empty lets the secondary provider take over instead
        // of a zero price ending up in the cache.
        let price = parse_price(quote.price.as_deref())
            .ok_or_else(|| MarketDataError::Empty(symbol.to_string()))?;
        Ok(FreshQuote {
            price,
            open: parse_decimal(quote.open.as_deref()),
            high: parse_decimal(quote.high.as_deref()),
            low: parse_decimal(quote.low.as_deref()),
            volume: parse_volume(quote.volume.as_deref()),
        })
    }

    async fn fetch_yahoo_quote(&self, symbol: &str) -> Result<FreshQuote, MarketDataError> {
        let url = format!("{}/stock/v3/get-chart", self.config.yahoo_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol), ("interval", "1m"), ("range", "1d")])
            .header("X-RapidAPI-Key", self.config.yahoo_api_key.as_str())
            .header("X-RapidAPI-Host", RAPIDAPI_HOST)
            .send()
            .await?;
        let envelope: YahooChartEnvelope = response
            .json()
            .await
            .map_err(|e| MarketDataError::Decode(e.to_string()))?;

        let meta = envelope
            .chart
            .and_then(|c| c.result)
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .map(|r| r.meta)
            .ok_or_else(|| MarketDataError::Empty(symbol.to_string()))?;
        let price = meta
            .regular_market_price
            .ok_or_else(|| MarketDataError::Empty(symbol.to_string()))?;
        Ok(FreshQuote {
            price: decimal_from_f64(price)?,
            open: decimal_from_f64(meta.regular_market_open.unwrap_or(price))?,
            high: decimal_from_f64(meta.regular_market_day_high.unwrap_or(price))?,
            low: decimal_from_f64(meta.regular_market_day_low.unwrap_or(price))?,
            volume: meta.regular_market_volume.unwrap_or(0),
        })
    }

    async fn fetch_alpha_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<HistoricalQuote>, MarketDataError> {
        let mut query: Vec<(&str, &str)> = vec![
            ("function", timeframe.alpha_function()),
            ("symbol", symbol),
            ("outputsize", "compact"),
            ("apikey", self.config.alpha_vantage_api_key.as_str()),
        ];
        if let Some(interval) = timeframe.alpha_interval() {
            query.push(("interval", interval));
        }
        let response = self
            .http
            .get(&self.config.alpha_vantage_base_url)
            .query(&query)
            .send()
            .await?;
        let envelope: AlphaHistoryEnvelope = response
            .json()
            .await
            .map_err(|e| MarketDataError::Decode(e.to_string()))?;

        envelope.classify(symbol)?;
        let series = envelope
            .series_for(timeframe)
            .ok_or_else(|| MarketDataError::Empty(symbol.to_string()))?;

        // BTreeMap keys are ISO-ish date strings, so reverse iteration is
        // newest-first.
        let mut points = Vec::new();
        for (stamp, bar) in series.iter().rev().take(timeframe.data_points()) {
            let Some(timestamp) = parse_alpha_timestamp(stamp) else {
                tracing::warn!(stamp = %stamp, "skipping history point with unparseable timestamp");
                continue;
            };
            points.push(HistoricalQuote {
                timestamp,
                price: parse_decimal(bar.close.as_deref()),
                open: parse_decimal(bar.open.as_deref()),
                high: parse_decimal(bar.high.as_deref()),
                low: parse_decimal(bar.low.as_deref()),
                volume: parse_volume(bar.volume.as_deref()),
            });
        }
        if points.is_empty() {
            return Err(MarketDataError::Empty(symbol.to_string()));
        }
        Ok(points)
    }

    async fn fetch_yahoo_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<HistoricalQuote>, MarketDataError> {
        let url = format!("{}/stock/v3/get-historical-data", self.config.yahoo_base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("range", timeframe.yahoo_range()),
                ("interval", timeframe.yahoo_interval()),
            ])
            .header("X-RapidAPI-Key", self.config.yahoo_api_key.as_str())
            .header("X-RapidAPI-Host", RAPIDAPI_HOST)
            .send()
            .await?;
        let envelope: YahooHistoryEnvelope = response
            .json()
            .await
            .map_err(|e| MarketDataError::Decode(e.to_string()))?;

        let prices = envelope
            .prices
            .filter(|p| !p.is_empty())
            .ok_or_else(|| MarketDataError::Empty(symbol.to_string()))?;

        let mut points = Vec::new();
        for price in prices.into_iter().take(timeframe.data_points()) {
            // Dividend/split rows come through without close data; skip them.
            let (Some(date), Some(close)) = (price.date, price.close) else {
                continue;
            };
            let Some(timestamp) = DateTime::<Utc>::from_timestamp(date, 0) else {
                continue;
            };
            points.push(HistoricalQuote {
                timestamp,
                price: decimal_from_f64(close)?,
                open: decimal_from_f64(price.open.unwrap_or(close))?,
                high: decimal_from_f64(price.high.unwrap_or(close))?,
                low: decimal_from_f64(price.low.unwrap_or(close))?,
                volume: price.volume.unwrap_or(0.0) as i64,
            });
        }
        if points.is_empty() {
            return Err(MarketDataError::Empty(symbol.to_string()));
        }
        Ok(points)
    }
}

// ---- provider A payloads ----

#[derive(Debug, Deserialize)]
struct AlphaQuoteEnvelope {
    #[serde(rename = "Global Quote")]
    global_quote: Option<AlphaGlobalQuote>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlphaGlobalQuote {
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlphaHistoryEnvelope {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Time Series (5min)")]
    intraday: Option<BTreeMap<String, AlphaBar>>,
    #[serde(rename = "Time Series (Daily)")]
    daily: Option<BTreeMap<String, AlphaBar>>,
    #[serde(rename = "Weekly Time Series")]
    weekly: Option<BTreeMap<String, AlphaBar>>,
}

#[derive(Debug, Deserialize)]
struct AlphaBar {
    #[serde(rename = "1. open")]
    open: Option<String>,
    #[serde(rename = "2. high")]
    high: Option<String>,
    #[serde(rename = "3. low")]
    low: Option<String>,
    #[serde(rename = "4. close")]
    close: Option<String>,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}

impl AlphaQuoteEnvelope {
    fn classify(&self, symbol: &str) -> Result<(), MarketDataError> {
        classify_alpha(
            symbol,
            self.note.as_deref(),
            self.information.as_deref(),
            self.error_message.as_deref(),
        )
    }
}

impl AlphaHistoryEnvelope {
    fn classify(&self, symbol: &str) -> Result<(), MarketDataError> {
        classify_alpha(
            symbol,
            self.note.as_deref(),
            self.information.as_deref(),
            self.error_message.as_deref(),
        )
    }

    fn series_for(&self, timeframe: Timeframe) -> Option<&BTreeMap<String, AlphaBar>> {
        let series = match timeframe.alpha_function() {
            "TIME_SERIES_INTRADAY" => self.intraday.as_ref(),
            "TIME_SERIES_DAILY" => self.daily.as_ref(),
            _ => self.weekly.as_ref(),
        };
        series.filter(|s| !s.is_empty())
    }
}

/// `Note` and `Information` are how the provider reports hitting its request
/// quota; `Error Message` is an unknown-symbol or bad-request response.
fn classify_alpha(
    symbol: &str,
    note: Option<&str>,
    information: Option<&str>,
    error_message: Option<&str>,
) -> Result<(), MarketDataError> {
    if let Some(msg) = note.or(information) {
        return Err(MarketDataError::RateLimited(msg.to_string()));
    }
    if error_message.is_some() {
        return Err(MarketDataError::NotFound(symbol.to_string()));
    }
    Ok(())
}

// ---- provider B payloads ----

#[derive(Debug, Deserialize)]
struct YahooChartEnvelope {
    chart: Option<YahooChart>,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooChartResult>>,
}

#[derive(Debug, Deserialize)]
struct YahooChartResult {
    meta: YahooMeta,
}

#[derive(Debug, Deserialize)]
struct YahooMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketOpen")]
    regular_market_open: Option<f64>,
    #[serde(rename = "regularMarketDayHigh")]
    regular_market_day_high: Option<f64>,
    #[serde(rename = "regularMarketDayLow")]
    regular_market_day_low: Option<f64>,
    #[serde(rename = "regularMarketVolume")]
    regular_market_volume: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct YahooHistoryEnvelope {
    prices: Option<Vec<YahooPrice>>,
}

#[derive(Debug, Deserialize)]
struct YahooPrice {
    date: Option<i64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

// ---- field parsing ----

/// Strict parse for the one field that must be right: the current price.
fn parse_price(value: Option<&str>) -> Option<Decimal> {
    let cleaned = value?.trim().trim_start_matches('$').replace(',', "");
    cleaned.parse().ok()
}

/// Providers quote prices as strings, occasionally with a currency sign or
/// thousands separators. Unparseable ancillary values (open/high/low/close
/// of a history bar) degrade to zero rather than failing the whole payload.
fn parse_decimal(value: Option<&str>) -> Decimal {
    let Some(raw) = value else {
        return Decimal::ZERO;
    };
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    cleaned.parse().unwrap_or_else(|_| {
        tracing::warn!(value = %raw, "unparseable decimal in provider payload");
        Decimal::ZERO
    })
}

fn parse_volume(value: Option<&str>) -> i64 {
    let Some(raw) = value else {
        return 0;
    };
    raw.replace(',', "").trim().parse().unwrap_or_else(|_| {
        tracing::warn!(value = %raw, "unparseable volume in provider payload");
        0
    })
}

fn decimal_from_f64(value: f64) -> Result<Decimal, MarketDataError> {
    Decimal::try_from(value)
        .map_err(|_| MarketDataError::Decode(format!("non-finite price value {value}")))
}

/// Timestamps arrive either as `YYYY-MM-DD HH:MM:SS` (intraday) or as a bare
/// date (daily/weekly).
fn parse_alpha_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })?;
    Some(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_symbol_maps_domestic_tickers() {
        assert_eq!(format_symbol("reliance"), "RELIANCE.BSE");
        assert_eq!(format_symbol("TCS"), "TCS.BSE");
        assert_eq!(format_symbol("AAPL"), "AAPL");
        assert_eq!(format_symbol("unknown"), "UNKNOWN");
    }

    #[test]
    fn parse_price_rejects_garbage_instead_of_zeroing() {
        assert_eq!(parse_price(Some("190.25")), Some(dec!(190.25)));
        assert_eq!(parse_price(Some("$1,234.50")), Some(dec!(1234.50)));
        assert_eq!(parse_price(Some("N/A")), None);
        assert_eq!(parse_price(None), None);
    }

    #[test]
    fn parse_decimal_handles_provider_noise() {
        assert_eq!(parse_decimal(Some("123.45")), dec!(123.45));
        assert_eq!(parse_decimal(Some("$1,234.50")), dec!(1234.50));
        assert_eq!(parse_decimal(Some("garbage")), Decimal::ZERO);
        assert_eq!(parse_decimal(None), Decimal::ZERO);
    }

    #[test]
    fn alpha_timestamps_with_and_without_time() {
        let intraday = parse_alpha_timestamp("2024-03-01 15:55:00").unwrap();
        assert_eq!(intraday.to_rfc3339(), "2024-03-01T15:55:00+00:00");
        let daily = parse_alpha_timestamp("2024-03-01").unwrap();
        assert_eq!(daily.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(parse_alpha_timestamp("not a date").is_none());
    }

    #[test]
    fn rate_limit_payload_classified_before_series_lookup() {
        let env = AlphaHistoryEnvelope {
            note: Some("Thank you for using our API".into()),
            information: None,
            error_message: None,
            intraday: None,
            daily: None,
            weekly: None,
        };
        assert!(matches!(
            env.classify("AAPL"),
            Err(MarketDataError::RateLimited(_))
        ));
    }
}
