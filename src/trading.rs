//! Trade execution: validate, settle cash, record the trade, update the
//! position. Planning is pure; commit is one database transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger;
use crate::persistence;
use crate::types::position::Position;
use crate::types::trade::{Trade, TradeSide};
use crate::types::user::User;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TradeRequest {
    pub username: String,
    pub symbol: String,
    #[serde(alias = "tradeType")]
    pub side: String,
    pub quantity: i64,
    pub price: Decimal,
}

/// Everything a validated trade will write, computed before any mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct TradePlan {
    pub new_balance: Decimal,
    pub position: Position,
    pub trade: Trade,
}

/// Validate a trade and compute its full effect. Pure: rejection here means
/// nothing has been touched. Checks run in order: side, quantity/price,
/// then the balance gate (buy) or share sufficiency (sell) — a sell is
/// checked against holdings before any cash is credited.
pub fn plan_trade(
    user: &User,
    position: Option<Position>,
    symbol: &str,
    side: &str,
    quantity: i64,
    price: Decimal,
    now: DateTime<Utc>,
) -> Result<TradePlan, AppError> {
    let side = TradeSide::parse(side).ok_or_else(|| {
        AppError::InvalidArgument(format!("invalid trade side '{side}', use BUY or SELL"))
    })?;
    if quantity <= 0 {
        return Err(AppError::InvalidArgument(
            "quantity must be positive".into(),
        ));
    }
    if price <= Decimal::ZERO {
        return Err(AppError::InvalidArgument("price must be positive".into()));
    }

    let total_amount = Decimal::from(quantity) * price;
    let new_balance = match side {
        TradeSide::Buy => {
            if user.account_balance < total_amount {
                return Err(AppError::InsufficientFunds {
                    have: user.account_balance,
                    need: total_amount,
                });
            }
            user.account_balance - total_amount
        }
        // The simulator credits sale proceeds unconditionally once the
        // ledger has confirmed the shares exist.
        TradeSide::Sell => user.account_balance + total_amount,
    };

    let position = ledger::apply_trade(position, user.id, symbol, side, quantity, price, now)?;

    let trade = Trade {
        id: Uuid::new_v4(),
        user_id: user.id,
        symbol: symbol.to_string(),
        side,
        quantity,
        price,
        total_amount,
        created_at: now,
    };

    Ok(TradePlan {
        new_balance,
        position,
        trade,
    })
}

/// Execute a trade as a single atomic unit: either the balance update, the
/// trade record and the position update all commit, or none do.
///
/// The `FOR UPDATE` lock on the user row serializes settlement per user, so
/// two concurrent trades cannot interleave the ledger's read-modify-write;
/// trades for different users proceed in parallel.
pub async fn execute_trade(pool: &PgPool, request: &TradeRequest) -> Result<Trade, AppError> {
    let username = request.username.trim().to_lowercase();
    let symbol = request.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::InvalidArgument("symbol must not be empty".into()));
    }

    let mut tx = pool.begin().await?;

    let user_row = persistence::get_user_for_update(&mut tx, &username)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let user = persistence::user_row_to_user(user_row);
    let position = persistence::get_position(&mut tx, user.id, &symbol)
        .await?
        .map(persistence::position_row_to_position);

    let plan = plan_trade(
        &user,
        position,
        &symbol,
        &request.side,
        request.quantity,
        request.price,
        Utc::now(),
    )?;

    persistence::update_balance(&mut tx, user.id, plan.new_balance).await?;
    persistence::insert_trade(&mut tx, &plan.trade).await?;
    persistence::upsert_position(&mut tx, &plan.position).await?;

    tx.commit().await?;

    tracing::info!(
        user = %username,
        symbol = %symbol,
        side = plan.trade.side.as_str(),
        quantity = plan.trade.quantity,
        price = %plan.trade.price,
        "trade settled"
    );
    Ok(plan.trade)
}
