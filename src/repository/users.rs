use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{EmailAddress, UserName};

const USER_COLUMNS: &str = "id, username, email, password_hash, avatar, \
    refresh_token, confirmed, created_at, updated_at";

#[derive(Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub refresh_token: Option<String>,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Keep hashes and tokens out of logs
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("confirmed", &self.confirmed)
            .finish()
    }
}

/// Gravatar image for `email`, the default avatar of new users.
pub fn gravatar_url(email: &str) -> String {
    let digest = md5::compute(email.trim().to_lowercase().as_bytes());
    format!("https://www.gravatar.com/avatar/{:x}", digest)
}

#[tracing::instrument(name = "Get user by email", skip(pool))]
pub async fn get_user_by_email(
    email: &str,
    pool: &PgPool,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = $1",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

#[tracing::instrument(
    name = "Saving new user details in the database",
    skip(name, email, password_hash, pool),
    fields(user_email = %email)
)]
pub async fn create_user(
    name: &UserName,
    email: &EmailAddress,
    password_hash: &Secret<String>,
    pool: &PgPool,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (id, username, email, password_hash, avatar)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(name.as_ref())
    .bind(email.as_ref())
    .bind(password_hash.expose_secret())
    .bind(gravatar_url(email.as_ref()))
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to execute query: {:?}", e);
        e
    })
}

/// Store the refresh token of `user_id`, or revoke it with `None`.
#[tracing::instrument(name = "Update refresh token", skip(token, pool))]
pub async fn update_token(
    user_id: Uuid,
    token: Option<&str>,
    pool: &PgPool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET refresh_token = $1, updated_at = now() WHERE id = $2")
        .bind(token)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[tracing::instrument(name = "Mark email as confirmed", skip(pool))]
pub async fn confirmed_email(email: &str, pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET confirmed = TRUE, updated_at = now() WHERE email = $1")
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}

#[tracing::instrument(name = "Update avatar url", skip(pool))]
pub async fn update_avatar_url(
    email: &str,
    url: Option<&str>,
    pool: &PgPool,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET avatar = $1, updated_at = now() WHERE email = $2 RETURNING {}",
        USER_COLUMNS
    ))
    .bind(url)
    .bind(email)
    .fetch_optional(pool)
    .await
}
