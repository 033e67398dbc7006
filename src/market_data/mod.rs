//! Quote provider adapter: provider A, provider B, then the database-backed
//! cache of the last successful fetch.

mod client;
mod timeframe;

pub use client::{format_symbol, FreshQuote, QuoteClient};
pub use timeframe::Timeframe;

use chrono::Utc;
use sqlx::PgPool;

use crate::error::AppError;
use crate::persistence;
use crate::types::stock::{HistoricalQuote, Stock};

/// Fetch the current quote for a symbol, falling back to the cached row when
/// both providers fail. Every fresh fetch overwrites the cache, which is
/// exactly what makes the fallback possible next time.
pub async fn get_quote(
    pool: &PgPool,
    client: &QuoteClient,
    symbol: &str,
) -> Result<Stock, AppError> {
    let symbol = symbol.to_uppercase();
    match client.fetch_quote(&symbol).await {
        Ok(fresh) => {
            let stock = Stock {
                symbol: symbol.clone(),
                company_name: None,
                current_price: fresh.price,
                open_price: fresh.open,
                high_price: fresh.high,
                low_price: fresh.low,
                volume: fresh.volume,
                last_updated: Utc::now(),
            };
            persistence::upsert_stock(pool, &stock).await?;
            Ok(stock)
        }
        Err(err) => {
            tracing::warn!(symbol = %symbol, error = %err, "all quote providers failed, trying cache");
            match persistence::get_stock_by_symbol(pool, &symbol).await? {
                Some(row) => Ok(persistence::stock_row_to_stock(row)),
                None => Err(AppError::DataUnavailable(symbol)),
            }
        }
    }
}

/// Fetch a historical series for a symbol. No cache fallback here: history
/// is not persisted, only the current quote is.
pub async fn get_history(
    client: &QuoteClient,
    symbol: &str,
    timeframe: &str,
) -> Result<Vec<HistoricalQuote>, AppError> {
    let timeframe = Timeframe::parse(timeframe)
        .ok_or_else(|| AppError::InvalidArgument(format!("invalid timeframe: {timeframe}")))?;
    let series = client.fetch_history(symbol, timeframe).await?;
    Ok(series)
}
