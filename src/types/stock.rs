use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Last-known quote for a symbol. Persisted as a best-effort cache and used
/// as the fallback when every provider fails; never the source of truth for
/// position accounting at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub company_name: Option<String>,
    pub current_price: Decimal,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub volume: i64,
    pub last_updated: DateTime<Utc>,
}

/// One point of a historical price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalQuote {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
}
