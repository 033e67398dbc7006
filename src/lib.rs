//! Simulated stock-trading backend: users with a cash balance, buy/sell
//! trades settled against weighted-average-cost positions, and portfolio
//! valuation from live quotes with a cached fallback.

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod market_data;
pub mod persistence;
pub mod portfolio;
pub mod trading;
pub mod types;
