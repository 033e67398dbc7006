use std::sync::Arc;

use trading_sim::api::routes::{app_router, AppState};
use trading_sim::config::Config;
use trading_sim::market_data::QuoteClient;
use trading_sim::persistence;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    let pool = match persistence::create_pool_and_migrate(&config.database_url).await {
        Ok(pool) => pool,
        Err(err) => {
            eprintln!("database setup failed: {err}");
            std::process::exit(1);
        }
    };

    let market = match QuoteClient::new(config.market.clone()) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("quote client setup failed: {err}");
            std::process::exit(1);
        }
    };

    let state = AppState {
        pool,
        market,
        jwt_secret: Arc::new(config.jwt_secret.clone()),
    };

    let app = app_router(state);
    tracing::info!(addr = %config.bind_addr, "listening");
    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind {}: {err}", config.bind_addr);
            std::process::exit(1);
        }
    };
    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("server error: {err}");
        std::process::exit(1);
    }
}
