use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context;
use sqlx::PgPool;

use super::{issue_tokens, AuthApiError};
use crate::authentication::{bearer_token, TokenService};
use crate::repository::users as repository_users;

/// Trade the current refresh token for a new token pair.
///
/// Only the latest issued refresh token is accepted. Presenting any other
/// valid one revokes the stored token, forcing a new login.
#[tracing::instrument(name = "Refresh tokens", skip(request, pool, tokens))]
pub async fn refresh_token(
    request: HttpRequest,
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AuthApiError> {
    let token = bearer_token(request.headers())
        .map_err(|_| AuthApiError::Unauthorized("Not authenticated".into()))?;
    let email = tokens
        .decode_refresh_token(token)
        .map_err(|e| AuthApiError::Unauthorized(e.to_string()))?;

    let user = repository_users::get_user_by_email(&email, &pool)
        .await
        .context("Failed to retrieve the user")?
        .ok_or_else(|| {
            AuthApiError::Unauthorized("Could not validate credentials".into())
        })?;

    if user.refresh_token.as_deref() != Some(token) {
        repository_users::update_token(user.id, None, &pool)
            .await
            .context("Failed to revoke the refresh token")?;
        return Err(AuthApiError::Unauthorized("Invalid refresh token".into()));
    }

    let token_pair = issue_tokens(&tokens, &email)?;
    repository_users::update_token(user.id, Some(&token_pair.refresh_token), &pool)
        .await
        .context("Failed to store the refresh token")?;

    Ok(HttpResponse::Ok().json(token_pair))
}
