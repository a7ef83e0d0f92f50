//! User repository.

use chrono::{NaiveDateTime, Utc};
use sqlx::mysql::MySqlPool;

use normgate_error::GatewayError;

use crate::model::{new_id, User};

/// Repository over the `users` table.
#[derive(Debug, Clone)]
pub struct UserStore {
    pool: MySqlPool,
}

impl UserStore {
    /// Wrap a pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Insert a new user and return the stored row.
    pub async fn create(
        &self,
        email: &str,
        username: Option<&str>,
        password_hash: &str,
    ) -> Result<User, GatewayError> {
        let now = Utc::now().naive_utc();
        let user = User {
            id: new_id(),
            username: username.filter(|u| !u.is_empty()).map(ToString::to_string),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            reset_token: None,
            reset_token_expires: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    /// Look up by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, GatewayError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Look up by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, GatewayError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Look up by username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, GatewayError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Login lookup: the credential matches either username or email.
    pub async fn find_by_credential(&self, credential: &str) -> Result<Option<User>, GatewayError> {
        if let Some(user) = self.find_by_username(credential).await? {
            return Ok(Some(user));
        }
        self.find_by_email(credential).await
    }

    /// Look up by an active reset token.
    pub async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, GatewayError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE reset_token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Stamp a successful login.
    pub async fn update_last_login(&self, id: &str) -> Result<(), GatewayError> {
        sqlx::query("UPDATE users SET last_login = ?, updated_at = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace the password hash.
    pub async fn set_password_hash(&self, id: &str, hash: &str) -> Result<(), GatewayError> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now().naive_utc())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store a fresh reset token with its expiry.
    pub async fn set_reset_token(
        &self,
        id: &str,
        token: &str,
        expires: NaiveDateTime,
    ) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE users SET reset_token = ?, reset_token_expires = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(expires)
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear the reset token (single use; also on expiry detection).
    pub async fn clear_reset_token(&self, id: &str) -> Result<(), GatewayError> {
        sqlx::query(
            "UPDATE users SET reset_token = NULL, reset_token_expires = NULL, updated_at = ? \
             WHERE id = ?",
        )
        .bind(Utc::now().naive_utc())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update profile fields that are present.
    pub async fn update_profile(
        &self,
        id: &str,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<(), GatewayError> {
        if let Some(username) = username {
            sqlx::query("UPDATE users SET username = ?, updated_at = ? WHERE id = ?")
                .bind(username)
                .bind(Utc::now().naive_utc())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(email) = email {
            sqlx::query("UPDATE users SET email = ?, updated_at = ? WHERE id = ?")
                .bind(email)
                .bind(Utc::now().naive_utc())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}
