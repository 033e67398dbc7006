pub mod dashboard;
pub mod position;
pub mod stock;
pub mod trade;
pub mod user;
