use actix_web::{web, HttpResponse};
use anyhow::Context;
use sqlx::PgPool;

use super::{queue_confirmation_email, AuthApiError};
use crate::authentication::TokenService;
use crate::domain::EmailAddress;
use crate::email_client::EmailClient;
use crate::repository::users as repository_users;
use crate::routes::MessageResponse;
use crate::startup::ApplicationBaseUrl;

#[derive(serde::Deserialize)]
pub struct RequestEmail {
    email: String,
}

#[tracing::instrument(
    name = "Request a new confirmation email",
    skip(body, pool, email_client, tokens, base_url),
    fields(user_email = %body.email)
)]
pub async fn request_email(
    body: web::Json<RequestEmail>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    tokens: web::Data<TokenService>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, AuthApiError> {
    let email = EmailAddress::parse(body.into_inner().email)
        .map_err(AuthApiError::ValidationError)?;

    let user = repository_users::get_user_by_email(email.as_ref(), &pool)
        .await
        .context("Failed to retrieve the user")?
        .ok_or_else(|| AuthApiError::NotRegistered(email.to_string()))?;

    if user.confirmed {
        return Ok(HttpResponse::Ok()
            .json(MessageResponse::new("Your email is already confirmed")));
    }

    queue_confirmation_email(email_client, tokens, base_url, email, user.username);
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Check your email for confirmation.",
    )))
}
