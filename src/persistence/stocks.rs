//! Stock quote cache: last successful provider fetch per symbol.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::types::stock::Stock;

#[derive(Debug, sqlx::FromRow)]
pub struct StockRow {
    pub symbol: String,
    pub company_name: Option<String>,
    pub current_price: Decimal,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub volume: i64,
    pub last_updated: DateTime<Utc>,
}

pub fn stock_row_to_stock(row: StockRow) -> Stock {
    Stock {
        symbol: row.symbol,
        company_name: row.company_name,
        current_price: row.current_price,
        open_price: row.open_price,
        high_price: row.high_price,
        low_price: row.low_price,
        volume: row.volume,
        last_updated: row.last_updated,
    }
}

const STOCK_COLUMNS: &str =
    "symbol, company_name, current_price, open_price, high_price, low_price, volume, last_updated";

/// Overwrite the cached quote for a symbol. Last writer wins.
pub async fn upsert_stock(pool: &PgPool, stock: &Stock) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO stocks (symbol, company_name, current_price, open_price, high_price, \
         low_price, volume, last_updated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (symbol) DO UPDATE SET company_name = COALESCE($2, stocks.company_name), \
         current_price = $3, open_price = $4, high_price = $5, low_price = $6, volume = $7, \
         last_updated = $8",
    )
    .bind(&stock.symbol)
    .bind(&stock.company_name)
    .bind(stock.current_price)
    .bind(stock.open_price)
    .bind(stock.high_price)
    .bind(stock.low_price)
    .bind(stock.volume)
    .bind(stock.last_updated)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_stock_by_symbol(
    pool: &PgPool,
    symbol: &str,
) -> Result<Option<StockRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, StockRow>(&format!(
        "SELECT {STOCK_COLUMNS} FROM stocks WHERE symbol = $1"
    ))
    .bind(symbol)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List all cached stocks.
pub async fn list_stocks(pool: &PgPool) -> Result<Vec<StockRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StockRow>(&format!(
        "SELECT {STOCK_COLUMNS} FROM stocks ORDER BY symbol"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
