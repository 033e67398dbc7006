//! Valuation read path: re-price stored positions with live quotes and
//! aggregate the dashboard view.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger;
use crate::market_data::{self, QuoteClient};
use crate::persistence;
use crate::types::dashboard::DashboardData;
use crate::types::position::Position;
use crate::types::user::User;

const RECENT_TRADES_LIMIT: i64 = 10;

async fn resolve_user(pool: &PgPool, username: &str) -> Result<User, AppError> {
    let row = persistence::get_user_by_username(pool, &username.trim().to_lowercase())
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(persistence::user_row_to_user(row))
}

/// Open positions for a user id, re-priced against live quotes. Positions
/// at quantity zero stay in storage but are excluded here. A failed quote
/// for one symbol falls back to the position's stored snapshot instead of
/// failing the whole portfolio; `get_quote` itself already degrades to the
/// cached price before that.
async fn live_positions(
    pool: &PgPool,
    client: &QuoteClient,
    user_id: Uuid,
) -> Result<Vec<Position>, AppError> {
    let rows = persistence::list_positions_for_user(pool, user_id).await?;
    let mut positions = Vec::with_capacity(rows.len());
    for row in rows {
        let mut pos = persistence::position_row_to_position(row);
        if pos.quantity == 0 {
            continue;
        }
        match market_data::get_quote(pool, client, &pos.symbol).await {
            Ok(stock) => ledger::revalue(&mut pos, stock.current_price),
            Err(err) => {
                tracing::warn!(symbol = %pos.symbol, error = %err, "valuation using stored snapshot");
            }
        }
        positions.push(pos);
    }
    Ok(positions)
}

/// A user's open positions with live valuation.
pub async fn get_portfolio(
    pool: &PgPool,
    client: &QuoteClient,
    username: &str,
) -> Result<Vec<Position>, AppError> {
    let user = resolve_user(pool, username).await?;
    live_positions(pool, client, user.id).await
}

/// Dashboard aggregate: cash balance, live-valued portfolio with totals,
/// recent trades and the all-time trade count. Totals are zero for a user
/// with no open positions. The user row is resolved once and reused for
/// the portfolio step.
pub async fn get_dashboard(
    pool: &PgPool,
    client: &QuoteClient,
    username: &str,
) -> Result<DashboardData, AppError> {
    let user = resolve_user(pool, username).await?;

    let portfolio = live_positions(pool, client, user.id).await?;
    let total_portfolio_value: Decimal = portfolio.iter().map(|p| p.current_value).sum();
    let total_profit_loss: Decimal = portfolio.iter().map(|p| p.profit_loss).sum();

    let recent_trades =
        persistence::list_trades_for_user(pool, user.id, RECENT_TRADES_LIMIT).await?;
    let total_trades = persistence::count_trades_for_user(pool, user.id).await?;

    Ok(DashboardData {
        account_balance: user.account_balance,
        total_portfolio_value,
        total_profit_loss,
        portfolio,
        recent_trades,
        total_trades,
    })
}
