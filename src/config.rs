//! Environment configuration. Everything the process needs is read once at
//! startup; the market-data section is handed to the quote client as an
//! explicit struct rather than living in process-wide state.

use std::time::Duration;

/// Provider endpoints and credentials for the quote client.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub alpha_vantage_api_key: String,
    pub alpha_vantage_base_url: String,
    pub yahoo_api_key: String,
    pub yahoo_base_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: Vec<u8>,
    pub market: MarketDataConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load from the environment (after `dotenvy::dotenv()` in main).
    /// Only `DATABASE_URL` is required.
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL is not set".to_string())?;
        let timeout_secs: u64 = env_or("QUOTE_TIMEOUT_SECS", "10")
            .parse()
            .map_err(|_| "QUOTE_TIMEOUT_SECS must be an integer".to_string())?;
        Ok(Self {
            database_url,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            jwt_secret: env_or("JWT_SECRET", "dev-secret-change-me").into_bytes(),
            market: MarketDataConfig {
                alpha_vantage_api_key: env_or("ALPHAVANTAGE_API_KEY", "demo"),
                alpha_vantage_base_url: env_or(
                    "ALPHAVANTAGE_BASE_URL",
                    "https://www.alphavantage.co/query",
                ),
                yahoo_api_key: env_or("YAHOOFINANCE_API_KEY", ""),
                yahoo_base_url: env_or(
                    "YAHOOFINANCE_BASE_URL",
                    "https://apidojo-yahoo-finance-v1.p.rapidapi.com",
                ),
                request_timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}
