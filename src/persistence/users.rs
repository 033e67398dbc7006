//! User persistence: insert, lookups, and balance updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::types::user::User;

/// Row returned from DB (username is stored lowercase).
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub account_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

pub fn user_row_to_user(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        email: row.email,
        full_name: row.full_name,
        password_hash: row.password_hash,
        account_balance: row.account_balance,
        created_at: row.created_at,
    }
}

const USER_COLUMNS: &str =
    "id, username, email, full_name, password_hash, account_balance, created_at";

/// Insert a user. Username must already be lowercase.
#[allow(clippy::too_many_arguments)]
pub async fn insert_user(
    pool: &PgPool,
    id: Uuid,
    username: &str,
    email: &str,
    full_name: Option<&str>,
    password_hash: &str,
    account_balance: Decimal,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, email, full_name, password_hash, account_balance, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(username)
    .bind(email)
    .bind(full_name)
    .bind(password_hash)
    .bind(account_balance)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Get a user by username (lowercase).
pub async fn get_user_by_username(
    pool: &PgPool,
    username_lowercase: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username_lowercase)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List all users.
pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Lock and fetch a user row inside a settlement transaction. The row lock
/// serializes trade settlement per user; different users never block each
/// other.
pub async fn get_user_for_update(
    conn: &mut PgConnection,
    username_lowercase: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1 FOR UPDATE"
    ))
    .bind(username_lowercase)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

/// Update the mutable profile fields. Username is immutable.
pub async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    email: &str,
    full_name: Option<&str>,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET email = $1, full_name = $2, password_hash = $3 WHERE id = $4")
        .bind(email)
        .bind(full_name)
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a user together with their positions and trade history, as one
/// transaction.
pub async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM positions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM trades WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Set a user's balance. Works on a pool connection or inside a transaction.
pub async fn update_balance(
    conn: &mut PgConnection,
    user_id: Uuid,
    new_balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET account_balance = $1 WHERE id = $2")
        .bind(new_balance)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
