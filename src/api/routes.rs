//! HTTP surface: thin handlers over the core modules.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::auth;
use crate::error::AppError;
use crate::market_data::{self, QuoteClient};
use crate::persistence::{self, PgPool};
use crate::portfolio;
use crate::trading::{self, TradeRequest};
use crate::types::user::User;

const TRADE_LIST_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub market: Arc<QuoteClient>,
    pub jwt_secret: Arc<Vec<u8>>,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users/register", post(register))
        .route("/api/users/login", post(login))
        .route("/api/users", get(list_users))
        .route("/api/users/{username}", get(get_user).delete(delete_user))
        .route("/api/users/{username}/profile", put(update_profile))
        .route("/api/users/{username}/balance", put(adjust_balance))
        .route("/api/stocks", get(list_stocks))
        .route("/api/stocks/{symbol}", get(get_cached_stock))
        .route("/api/stocks/{symbol}/realtime", get(get_realtime_stock))
        .route("/api/stocks/{symbol}/history", get(get_stock_history))
        .route("/api/trades/execute", post(execute_trade))
        .route("/api/trades/user/{username}", get(get_user_trades))
        .route("/api/trades/stock/{symbol}", get(get_stock_trades))
        .route("/api/portfolio/{username}", get(get_portfolio))
        .route("/api/dashboard/{username}", get(get_dashboard))
        .route("/api/dashboard/{username}/summary", get(get_dashboard_summary))
        .with_state(state)
}

async fn health() -> &'static str {
    "healthy"
}

// ---- users ----

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    #[serde(alias = "fullName")]
    full_name: Option<String>,
    #[serde(alias = "accountBalance")]
    account_balance: Option<Decimal>,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if req.password.len() < 6 {
        return Err(AppError::InvalidArgument(
            "password must be at least 6 characters long".into(),
        ));
    }
    let username = req.username.trim().to_lowercase();
    let email = req.email.trim().to_string();
    if username.is_empty() || email.is_empty() {
        return Err(AppError::InvalidArgument(
            "username and email are required".into(),
        ));
    }
    if persistence::get_user_by_username(&state.pool, &username)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadyExists("username"));
    }
    if persistence::get_user_by_email(&state.pool, &email)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadyExists("email"));
    }

    let balance = req.account_balance.unwrap_or(Decimal::ZERO);
    if balance < Decimal::ZERO {
        return Err(AppError::InvalidArgument(
            "initial balance must not be negative".into(),
        ));
    }

    let user = User {
        id: Uuid::new_v4(),
        username,
        email,
        full_name: req.full_name,
        password_hash: auth::hash_password(&req.password)?,
        account_balance: balance,
        created_at: Utc::now(),
    };
    persistence::insert_user(
        &state.pool,
        user.id,
        &user.username,
        &user.email,
        user.full_name.as_deref(),
        &user.password_hash,
        user.account_balance,
        user.created_at,
    )
    .await
    .map_err(AppError::from_unique_violation)?;
    tracing::info!(username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let username = req.username.trim().to_lowercase();
    let row = persistence::get_user_by_username(&state.pool, &username)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let user = persistence::user_row_to_user(row);
    if !auth::verify_password(&req.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }
    let token = auth::create_token(&state.jwt_secret, user.id)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(json!({ "token": token, "user": user })))
}

async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<User>, AppError> {
    let row = persistence::get_user_by_username(&state.pool, &username.trim().to_lowercase())
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(persistence::user_row_to_user(row)))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let rows = persistence::list_users(&state.pool).await?;
    Ok(Json(
        rows.into_iter().map(persistence::user_row_to_user).collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct ProfileUpdateRequest {
    email: Option<String>,
    #[serde(alias = "fullName")]
    full_name: Option<String>,
    password: Option<String>,
}

/// Update email, full name, and/or password. Username is immutable.
async fn update_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<User>, AppError> {
    let row = persistence::get_user_by_username(&state.pool, &username.trim().to_lowercase())
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let mut user = persistence::user_row_to_user(row);

    if let Some(email) = req.email {
        let email = email.trim().to_string();
        if email.is_empty() {
            return Err(AppError::InvalidArgument("email must not be empty".into()));
        }
        if let Some(existing) = persistence::get_user_by_email(&state.pool, &email).await? {
            if existing.id != user.id {
                return Err(AppError::AlreadyExists("email"));
            }
        }
        user.email = email;
    }
    if let Some(full_name) = req.full_name {
        user.full_name = Some(full_name);
    }
    if let Some(password) = req.password {
        if password.len() < 6 {
            return Err(AppError::InvalidArgument(
                "password must be at least 6 characters long".into(),
            ));
        }
        user.password_hash = auth::hash_password(&password)?;
    }

    persistence::update_profile(
        &state.pool,
        user.id,
        &user.email,
        user.full_name.as_deref(),
        &user.password_hash,
    )
    .await
    .map_err(AppError::from_unique_violation)?;
    Ok(Json(user))
}

/// Delete a user and their positions and trade history.
async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let row = persistence::get_user_by_username(&state.pool, &username.trim().to_lowercase())
        .await?
        .ok_or(AppError::NotFound("user"))?;
    persistence::delete_user(&state.pool, row.id).await?;
    tracing::info!(username = %username, "user deleted");
    Ok(Json(json!({ "message": "user deleted successfully" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BalanceAction {
    Set,
    Add,
    Subtract,
}

#[derive(Debug, Deserialize)]
struct BalanceRequest {
    action: BalanceAction,
    amount: Decimal,
}

/// Administrative balance adjustment. Runs under the same per-user row lock
/// as trade settlement so it cannot interleave with a trade.
async fn adjust_balance(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<BalanceRequest>,
) -> Result<Json<User>, AppError> {
    if req.amount < Decimal::ZERO {
        return Err(AppError::InvalidArgument(
            "amount must not be negative".into(),
        ));
    }
    let username = username.trim().to_lowercase();

    let mut tx = state.pool.begin().await?;
    let row = persistence::get_user_for_update(&mut tx, &username)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let mut user = persistence::user_row_to_user(row);

    user.account_balance = match req.action {
        BalanceAction::Set => req.amount,
        BalanceAction::Add => user.account_balance + req.amount,
        BalanceAction::Subtract => {
            if user.account_balance < req.amount {
                return Err(AppError::InsufficientFunds {
                    have: user.account_balance,
                    need: req.amount,
                });
            }
            user.account_balance - req.amount
        }
    };
    persistence::update_balance(&mut tx, user.id, user.account_balance).await?;
    tx.commit().await?;
    Ok(Json(user))
}

// ---- stocks ----

async fn list_stocks(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::types::stock::Stock>>, AppError> {
    let rows = persistence::list_stocks(&state.pool).await?;
    Ok(Json(
        rows.into_iter()
            .map(persistence::stock_row_to_stock)
            .collect(),
    ))
}

async fn get_cached_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<crate::types::stock::Stock>, AppError> {
    let row = persistence::get_stock_by_symbol(&state.pool, &symbol.to_uppercase())
        .await?
        .ok_or(AppError::NotFound("stock"))?;
    Ok(Json(persistence::stock_row_to_stock(row)))
}

async fn get_realtime_stock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<crate::types::stock::Stock>, AppError> {
    let stock = market_data::get_quote(&state.pool, &state.market, &symbol).await?;
    Ok(Json(stock))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    timeframe: Option<String>,
}

async fn get_stock_history(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<crate::types::stock::HistoricalQuote>>, AppError> {
    let timeframe = params.timeframe.as_deref().unwrap_or("1M");
    let series = market_data::get_history(&state.market, &symbol, timeframe).await?;
    Ok(Json(series))
}

// ---- trades ----

async fn execute_trade(
    State(state): State<AppState>,
    Json(req): Json<TradeRequest>,
) -> Result<Json<crate::types::trade::Trade>, AppError> {
    let trade = trading::execute_trade(&state.pool, &req).await?;
    Ok(Json(trade))
}

async fn get_user_trades(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<crate::types::trade::Trade>>, AppError> {
    let row = persistence::get_user_by_username(&state.pool, &username.trim().to_lowercase())
        .await?
        .ok_or(AppError::NotFound("user"))?;
    let trades = persistence::list_trades_for_user(&state.pool, row.id, TRADE_LIST_LIMIT).await?;
    Ok(Json(trades))
}

async fn get_stock_trades(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Vec<crate::types::trade::Trade>>, AppError> {
    let trades =
        persistence::list_trades_for_symbol(&state.pool, &symbol.to_uppercase(), TRADE_LIST_LIMIT)
            .await?;
    Ok(Json(trades))
}

// ---- portfolio & dashboard ----

async fn get_portfolio(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Vec<crate::types::position::Position>>, AppError> {
    let positions = portfolio::get_portfolio(&state.pool, &state.market, &username).await?;
    Ok(Json(positions))
}

async fn get_dashboard(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<crate::types::dashboard::DashboardData>, AppError> {
    let data = portfolio::get_dashboard(&state.pool, &state.market, &username).await?;
    Ok(Json(data))
}

/// Totals-only view of the dashboard.
async fn get_dashboard_summary(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let data = portfolio::get_dashboard(&state.pool, &state.market, &username).await?;
    Ok(Json(json!({
        "account_balance": data.account_balance,
        "total_portfolio_value": data.total_portfolio_value,
        "total_profit_loss": data.total_profit_loss,
    })))
}
