//! Domain errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors surfaced by the market-data fallback chain. `RateLimited`,
/// `Empty` and `Transient` are recoverable inside the adapter (they trigger
/// the next provider); callers only ever see them once the chain and the
/// cache are both exhausted.
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    #[error("provider rate limit: {0}")]
    RateLimited(String),
    #[error("symbol not found: {0}")]
    NotFound(String),
    #[error("provider returned no data for {0}")]
    Empty(String),
    #[error("provider request failed: {0}")]
    Transient(#[from] reqwest::Error),
    #[error("unexpected provider payload: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} already exists")]
    AlreadyExists(&'static str),
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientFunds {
        have: rust_decimal::Decimal,
        need: rust_decimal::Decimal,
    },
    #[error("insufficient shares to sell: have {have}, need {need}")]
    InsufficientShares { have: i64, need: i64 },
    #[error("no market data available for {0}")]
    DataUnavailable(String),
    #[error("market data error: {0}")]
    Market(#[from] MarketDataError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Insert races past a check-then-insert duplicate test still hit the
    /// UNIQUE constraint; surface those as `AlreadyExists` instead of a
    /// generic database error.
    pub fn from_unique_violation(err: sqlx::Error) -> AppError {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some("23505") {
                let what = match db.constraint() {
                    Some(c) if c.contains("email") => "email",
                    Some(c) if c.contains("username") => "username",
                    _ => "record",
                };
                return AppError::AlreadyExists(what);
            }
        }
        AppError::Db(err)
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::InvalidArgument(_)
            | AppError::InsufficientFunds { .. }
            | AppError::InsufficientShares { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::DataUnavailable(_) | AppError::Market(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
