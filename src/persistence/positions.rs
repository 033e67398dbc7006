//! Position persistence: upsert and lookups per (user, symbol).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::types::position::Position;

#[derive(Debug, sqlx::FromRow)]
pub struct PositionRow {
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: i64,
    pub average_price: Decimal,
    pub total_investment: Decimal,
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub last_updated: DateTime<Utc>,
}

pub fn position_row_to_position(row: PositionRow) -> Position {
    Position {
        user_id: row.user_id,
        symbol: row.symbol,
        quantity: row.quantity,
        average_price: row.average_price,
        total_investment: row.total_investment,
        current_value: row.current_value,
        profit_loss: row.profit_loss,
        last_updated: row.last_updated,
    }
}

const POSITION_COLUMNS: &str = "user_id, symbol, quantity, average_price, total_investment, \
     current_value, profit_loss, last_updated";

/// Upsert a position (insert or update on conflict). Settlement runs this
/// inside the trade transaction.
pub async fn upsert_position(conn: &mut PgConnection, pos: &Position) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO positions (user_id, symbol, quantity, average_price, total_investment, \
         current_value, profit_loss, last_updated) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (user_id, symbol) DO UPDATE SET quantity = $3, average_price = $4, \
         total_investment = $5, current_value = $6, profit_loss = $7, last_updated = $8",
    )
    .bind(pos.user_id)
    .bind(&pos.symbol)
    .bind(pos.quantity)
    .bind(pos.average_price)
    .bind(pos.total_investment)
    .bind(pos.current_value)
    .bind(pos.profit_loss)
    .bind(pos.last_updated)
    .execute(conn)
    .await?;
    Ok(())
}

/// Get one position inside a settlement transaction.
pub async fn get_position(
    conn: &mut PgConnection,
    user_id: Uuid,
    symbol: &str,
) -> Result<Option<PositionRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, PositionRow>(&format!(
        "SELECT {POSITION_COLUMNS} FROM positions WHERE user_id = $1 AND symbol = $2"
    ))
    .bind(user_id)
    .bind(symbol)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// List positions for a user (for the portfolio read path).
pub async fn list_positions_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<PositionRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PositionRow>(&format!(
        "SELECT {POSITION_COLUMNS} FROM positions WHERE user_id = $1 ORDER BY symbol"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
