use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::position::Position;
use crate::types::trade::Trade;

/// Aggregated view for GET /api/dashboard/{username}: cash balance plus
/// live-valued positions and recent trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub account_balance: Decimal,
    pub total_portfolio_value: Decimal,
    pub total_profit_loss: Decimal,
    pub portfolio: Vec<Position>,
    pub recent_trades: Vec<Trade>,
    pub total_trades: i64,
}
