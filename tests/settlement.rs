//! Database-backed settlement and cache-fallback tests.
//!
//! These need a reachable Postgres: set `DATABASE_URL` to run them, they
//! skip silently otherwise (the pure planner and ledger logic they sit on
//! is covered in tests/trading.rs and tests/ledger.rs without a database).

use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use trading_sim::config::MarketDataConfig;
use trading_sim::error::AppError;
use trading_sim::market_data::{self, QuoteClient};
use trading_sim::persistence::{self, PgPool};
use trading_sim::portfolio;
use trading_sim::trading::{execute_trade, TradeRequest};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(
        persistence::create_pool_and_migrate(&url)
            .await
            .expect("DATABASE_URL is set but the database is unreachable"),
    )
}

/// Quote client whose providers all point at a dead endpoint.
fn offline_client() -> QuoteClient {
    QuoteClient::new(MarketDataConfig {
        alpha_vantage_api_key: "test-key".into(),
        alpha_vantage_base_url: "http://127.0.0.1:9/query".into(),
        yahoo_api_key: "test-key".into(),
        yahoo_base_url: "http://127.0.0.1:9".into(),
        request_timeout: Duration::from_millis(200),
    })
    .unwrap()
}

fn client_for(server: &MockServer) -> QuoteClient {
    QuoteClient::new(MarketDataConfig {
        alpha_vantage_api_key: "test-key".into(),
        alpha_vantage_base_url: format!("{}/query", server.uri()),
        yahoo_api_key: "test-key".into(),
        yahoo_base_url: server.uri(),
        request_timeout: Duration::from_secs(2),
    })
    .unwrap()
}

async fn seed_user(pool: &PgPool, balance: Decimal) -> String {
    let id = Uuid::new_v4();
    let username = format!("trader-{}", id.simple());
    persistence::insert_user(
        pool,
        id,
        &username,
        &format!("{username}@example.com"),
        None,
        "unused-hash",
        balance,
        Utc::now(),
    )
    .await
    .unwrap();
    username
}

async fn balance_of(pool: &PgPool, username: &str) -> Decimal {
    let row = persistence::get_user_by_username(pool, username)
        .await
        .unwrap()
        .unwrap();
    row.account_balance
}

fn request(username: &str, symbol: &str, side: &str, quantity: i64, price: Decimal) -> TradeRequest {
    TradeRequest {
        username: username.to_string(),
        symbol: symbol.to_string(),
        side: side.to_string(),
        quantity,
        price,
    }
}

#[tokio::test]
async fn settlement_commits_all_three_writes_or_none() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let username = seed_user(&pool, dec!(1000)).await;
    let symbol = format!("TST{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase());

    // Buy 10 @ 50: balance, trade history and position move together.
    let trade = execute_trade(&pool, &request(&username, &symbol, "BUY", 10, dec!(50)))
        .await
        .unwrap();
    assert_eq!(trade.total_amount, dec!(500));
    assert_eq!(balance_of(&pool, &username).await, dec!(500));
    let user = persistence::get_user_by_username(&pool, &username)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        persistence::count_trades_for_user(&pool, user.id).await.unwrap(),
        1
    );

    // Second buy needs 700 with only 500 left: rejected, nothing changes.
    let err = execute_trade(&pool, &request(&username, &symbol, "BUY", 10, dec!(70)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientFunds { .. }));
    assert_eq!(balance_of(&pool, &username).await, dec!(500));
    assert_eq!(
        persistence::count_trades_for_user(&pool, user.id).await.unwrap(),
        1
    );

    // Oversell: rejected with no cash credit and no trade record.
    let err = execute_trade(&pool, &request(&username, &symbol, "SELL", 20, dec!(80)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientShares { .. }));
    assert_eq!(balance_of(&pool, &username).await, dec!(500));
    assert_eq!(
        persistence::count_trades_for_user(&pool, user.id).await.unwrap(),
        1
    );

    // Full sell closes out and credits the proceeds.
    execute_trade(&pool, &request(&username, &symbol, "SELL", 10, dec!(75)))
        .await
        .unwrap();
    assert_eq!(balance_of(&pool, &username).await, dec!(1250));
    let portfolio = portfolio::get_portfolio(&pool, &offline_client(), &username)
        .await
        .unwrap();
    assert!(portfolio.iter().all(|p| p.symbol != symbol));
}

#[tokio::test]
async fn portfolio_read_is_stable_between_trades() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let username = seed_user(&pool, dec!(1000)).await;
    let symbol = format!("TST{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase());
    execute_trade(&pool, &request(&username, &symbol, "BUY", 4, dec!(25)))
        .await
        .unwrap();

    let client = offline_client();
    let first = portfolio::get_portfolio(&pool, &client, &username).await.unwrap();
    let second = portfolio::get_portfolio(&pool, &client, &username).await.unwrap();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.quantity, b.quantity);
        assert_eq!(a.average_price, b.average_price);
    }
}

#[tokio::test]
async fn duplicate_registration_maps_to_already_exists() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let username = seed_user(&pool, Decimal::ZERO).await;

    let err = persistence::insert_user(
        &pool,
        Uuid::new_v4(),
        &username,
        "other@example.com",
        None,
        "unused-hash",
        Decimal::ZERO,
        Utc::now(),
    )
    .await
    .map_err(AppError::from_unique_violation)
    .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists("username")));

    let err = persistence::insert_user(
        &pool,
        Uuid::new_v4(),
        &format!("trader-{}", Uuid::new_v4().simple()),
        &format!("{username}@example.com"),
        None,
        "unused-hash",
        Decimal::ZERO,
        Utc::now(),
    )
    .await
    .map_err(AppError::from_unique_violation)
    .unwrap_err();
    assert!(matches!(err, AppError::AlreadyExists("email")));
}

#[tokio::test]
async fn quote_cache_serves_last_known_value_when_providers_die() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let symbol = format!("TST{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase());

    // First fetch succeeds and overwrites the cache.
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Global Quote": {
                "02. open": "120.00",
                "03. high": "126.00",
                "04. low": "119.00",
                "05. price": "123.45",
                "06. volume": "1000"
            }
        })))
        .mount(&server)
        .await;
    let stock = market_data::get_quote(&pool, &client_for(&server), &symbol)
        .await
        .unwrap();
    assert_eq!(stock.current_price, dec!(123.45));

    // Both providers down: the cached value comes back.
    let cached = market_data::get_quote(&pool, &offline_client(), &symbol)
        .await
        .unwrap();
    assert_eq!(cached.current_price, dec!(123.45));

    // No cache for an unseen symbol: the chain is exhausted.
    let unseen = format!("NEW{}", &Uuid::new_v4().simple().to_string()[..8].to_uppercase());
    let err = market_data::get_quote(&pool, &offline_client(), &unseen)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DataUnavailable(_)));
}
