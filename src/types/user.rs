use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account holder with a simulated cash balance.
/// Balance is only mutated by trade settlement or the balance endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub account_balance: Decimal,
    pub created_at: DateTime<Utc>,
}
