use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position per (user, symbol). Quantity never goes negative: a full sell
/// leaves the row at quantity 0 with averages reset, it is not deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: Uuid,
    pub symbol: String,
    pub quantity: i64,
    pub average_price: Decimal,
    /// quantity * average_price, kept as an explicit field for auditability.
    pub total_investment: Decimal,
    /// Valuation snapshot from the last write or re-pricing; the read path
    /// recomputes this from a live quote.
    pub current_value: Decimal,
    pub profit_loss: Decimal,
    pub last_updated: DateTime<Utc>,
}
