//! Trade persistence: append-only insert plus list for the API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::types::trade::{Trade, TradeSide};

#[derive(Debug, FromRow)]
pub struct TradeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub side: String,
    pub quantity: i64,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

fn trade_row_to_trade(row: &TradeRow) -> Option<Trade> {
    let side = TradeSide::parse(&row.side)?;
    Some(Trade {
        id: row.id,
        user_id: row.user_id,
        symbol: row.symbol.clone(),
        side,
        quantity: row.quantity,
        price: row.price,
        total_amount: row.total_amount,
        created_at: row.created_at,
    })
}

/// Insert a single trade (inside the settlement transaction). Trades are
/// never updated or deleted.
pub async fn insert_trade(conn: &mut PgConnection, trade: &Trade) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO trades (id, user_id, symbol, side, quantity, price, total_amount, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(trade.id)
    .bind(trade.user_id)
    .bind(&trade.symbol)
    .bind(trade.side.as_str())
    .bind(trade.quantity)
    .bind(trade.price)
    .bind(trade.total_amount)
    .bind(trade.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// List trades for a user, most recent first.
pub async fn list_trades_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Trade>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TradeRow>(
        "SELECT id, user_id, symbol, side, quantity, price, total_amount, created_at \
         FROM trades WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().filter_map(trade_row_to_trade).collect())
}

/// List trades for a symbol, most recent first.
pub async fn list_trades_for_symbol(
    pool: &PgPool,
    symbol: &str,
    limit: i64,
) -> Result<Vec<Trade>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TradeRow>(
        "SELECT id, user_id, symbol, side, quantity, price, total_amount, created_at \
         FROM trades WHERE symbol = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(symbol)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().filter_map(trade_row_to_trade).collect())
}

/// Total number of trades a user has executed (for the dashboard).
pub async fn count_trades_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}
