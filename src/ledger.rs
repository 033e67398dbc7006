//! Position ledger: weighted-average-cost accounting per (user, symbol).
//! Pure state transitions, testable without HTTP or a database.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::types::position::Position;
use crate::types::trade::TradeSide;

/// Apply one trade leg to a position, creating it on first buy.
///
/// BUY folds the new shares into the moving average:
/// `new_avg = (old_total + qty * price) / new_qty`.
/// SELL leaves the average untouched while shares remain and resets both
/// average and total investment to zero when the position is fully closed.
/// Selling more than held fails with `InsufficientShares` and no state
/// change.
///
/// Not idempotent: every call is one more trade leg. The trade executor is
/// responsible for invoking this exactly once per committed trade.
pub fn apply_trade(
    position: Option<Position>,
    user_id: Uuid,
    symbol: &str,
    side: TradeSide,
    quantity: i64,
    price: Decimal,
    now: DateTime<Utc>,
) -> Result<Position, AppError> {
    if quantity <= 0 {
        return Err(AppError::InvalidArgument(
            "quantity must be positive".into(),
        ));
    }
    if price <= Decimal::ZERO {
        return Err(AppError::InvalidArgument("price must be positive".into()));
    }

    let mut pos = position.unwrap_or_else(|| Position {
        user_id,
        symbol: symbol.to_string(),
        quantity: 0,
        average_price: Decimal::ZERO,
        total_investment: Decimal::ZERO,
        current_value: Decimal::ZERO,
        profit_loss: Decimal::ZERO,
        last_updated: now,
    });

    match side {
        TradeSide::Buy => {
            let new_quantity = pos.quantity + quantity;
            let new_total = pos.total_investment + Decimal::from(quantity) * price;
            pos.average_price = new_total / Decimal::from(new_quantity);
            pos.total_investment = new_total;
            pos.quantity = new_quantity;
        }
        TradeSide::Sell => {
            if quantity > pos.quantity {
                return Err(AppError::InsufficientShares {
                    have: pos.quantity,
                    need: quantity,
                });
            }
            let new_quantity = pos.quantity - quantity;
            if new_quantity > 0 {
                // Average cost is held constant through sells; only the
                // invested total shrinks with the share count.
                pos.total_investment = Decimal::from(new_quantity) * pos.average_price;
            } else {
                pos.average_price = Decimal::ZERO;
                pos.total_investment = Decimal::ZERO;
            }
            pos.quantity = new_quantity;
        }
    }

    // Valuation snapshot at the traded price; the portfolio read path
    // re-prices from a live quote.
    revalue(&mut pos, price);
    pos.last_updated = now;
    Ok(pos)
}

/// Recompute the derived valuation fields against a reference price.
pub fn revalue(pos: &mut Position, price: Decimal) {
    pos.current_value = Decimal::from(pos.quantity) * price;
    pos.profit_loss = pos.current_value - pos.average_price * Decimal::from(pos.quantity);
}
