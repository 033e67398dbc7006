//! Database layer: pool, migrations, and access for users, stocks,
//! positions, and trades.

mod pool;
mod positions;
mod stocks;
mod trades;
mod users;

pub use pool::{create_pool_and_migrate, run_migrations};
pub use positions::{
    get_position, list_positions_for_user, position_row_to_position, upsert_position, PositionRow,
};
pub use sqlx::PgPool;
pub use stocks::{get_stock_by_symbol, list_stocks, stock_row_to_stock, upsert_stock, StockRow};
pub use trades::{
    count_trades_for_user, insert_trade, list_trades_for_symbol, list_trades_for_user,
};
pub use users::{
    delete_user, get_user_by_email, get_user_by_username, get_user_for_update, insert_user,
    list_users, update_balance, update_profile, user_row_to_user, UserRow,
};
