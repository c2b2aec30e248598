use actix_web::{web, HttpResponse};
use anyhow::Context;
use sqlx::PgPool;

use super::AuthApiError;
use crate::authentication::TokenService;
use crate::repository::users as repository_users;
use crate::routes::MessageResponse;

#[tracing::instrument(name = "Confirm an email address", skip(token, pool, tokens))]
pub async fn confirmed_email(
    token: web::Path<String>,
    pool: web::Data<PgPool>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, AuthApiError> {
    let email = tokens
        .get_email_from_token(&token)
        .map_err(|_| AuthApiError::InvalidEmailToken)?;

    let user = repository_users::get_user_by_email(&email, &pool)
        .await
        .context("Failed to retrieve the user")?
        .ok_or(AuthApiError::VerificationError)?;

    if user.confirmed {
        return Ok(HttpResponse::Ok()
            .json(MessageResponse::new("Your email is already confirmed")));
    }

    repository_users::confirmed_email(&email, &pool)
        .await
        .context("Failed to mark the email as confirmed")?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Email confirmed")))
}
