use actix_web::{web, HttpResponse};
use anyhow::Context;
use secrecy::Secret;
use sqlx::PgPool;

use super::{issue_tokens, AuthApiError};
use crate::authentication::{verify_password, AuthError, TokenService};
use crate::repository::users as repository_users;

/// OAuth2 password form: the username is the user's email.
#[derive(serde::Deserialize)]
pub struct LoginForm {
    username: String,
    password: Secret<String>,
}

#[tracing::instrument(
    name = "Log in",
    skip(form, pool, tokens),
    fields(username = %form.username, user_id = tracing::field::Empty)
)]
pub async fn login(
    form: web::Form<LoginForm>,
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AuthApiError> {
    let LoginForm { username, password } = form.into_inner();

    // Emails are stored trimmed
    let user = repository_users::get_user_by_email(username.trim(), &pool)
        .await
        .context("Failed to retrieve the user")?
        .ok_or_else(|| AuthApiError::Unauthorized("Invalid email".into()))?;
    tracing::Span::current().record("user_id", &tracing::field::display(&user.id));

    if !user.confirmed {
        return Err(AuthApiError::Unauthorized("Email not confirmed".into()));
    }

    match verify_password(Secret::new(user.password_hash.clone()), password).await {
        Ok(()) => {}
        Err(AuthError::InvalidCredentials(_)) => {
            return Err(AuthApiError::Unauthorized("Invalid password".into()))
        }
        Err(AuthError::UnexpectedError(e)) => return Err(e.into()),
    }

    let token_pair = issue_tokens(&tokens, &user.email)?;
    repository_users::update_token(user.id, Some(&token_pair.refresh_token), &pool)
        .await
        .context("Failed to store the refresh token")?;

    Ok(HttpResponse::Ok().json(token_pair))
}
