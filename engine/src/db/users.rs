/// User account persistence
///
/// Stores identity records. Password hashes are written and read here but
/// never produced or verified here; that belongs to the credential store.
/// All queries use parameterized queries for SQL injection prevention.
use anyhow::{Context, Result};
use sdk::types::Role;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::unix_now;

/// User record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: i64,
}

const USER_COLUMNS: &str = "id, email, password, name, role, created_at";

fn user_from_row(r: &SqliteRow) -> Result<User> {
    let role: String = r.get("role");
    Ok(User {
        id: r.get("id"),
        email: r.get("email"),
        password_hash: r.get("password"),
        name: r.get("name"),
        role: role.parse()?,
        created_at: r.get("created_at"),
    })
}

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account with role `user`
    ///
    /// Returns `None` when the email is already taken. The UNIQUE constraint
    /// is the final arbiter, so two racing registrations cannot both win.
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<Option<User>> {
        let now = unix_now()?;
        let role = Role::User;

        let result = sqlx::query(
            "INSERT INTO users (email, password, name, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.pool)
        .await;

        let done = match result {
            Ok(done) => done,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Ok(None);
            }
            Err(e) => return Err(e).context("Failed to create user"),
        };

        Ok(Some(User {
            id: done.last_insert_rowid(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.map(String::from),
            role,
            created_at: now,
        }))
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Check if an account exists for an email
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check user existence")?;

        Ok(count > 0)
    }

    /// Replace the stored password hash
    ///
    /// Returns false when no such user exists.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let done = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;

        Ok(done.rows_affected() > 0)
    }

    /// Assign a role by email
    ///
    /// Operator-only; no request handler reaches this.
    pub async fn set_role(&self, email: &str, role: Role) -> Result<bool> {
        let done = sqlx::query("UPDATE users SET role = ? WHERE email = ?")
            .bind(role.as_str())
            .bind(email)
            .execute(&self.pool)
            .await
            .context("Failed to set user role")?;

        Ok(done.rows_affected() > 0)
    }
}
