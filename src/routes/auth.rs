mod confirmed_email;
mod login;
mod refresh_token;
mod request_email;
mod signup;

pub use confirmed_email::*;
pub use login::*;
pub use refresh_token::*;
pub use request_email::*;
pub use signup::*;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use anyhow::Context;
use tracing::Instrument;

use crate::authentication::TokenService;
use crate::domain::EmailAddress;
use crate::email_client::{send_confirmation_email, EmailClient};
use crate::routes::error_chain_fmt;
use crate::startup::ApplicationBaseUrl;
use crate::utils::error_detail;

#[derive(thiserror::Error)]
pub enum AuthApiError {
    #[error("{0}")]
    ValidationError(String),
    #[error("Account already exists")]
    AccountExists,
    #[error("{0}")]
    Unauthorized(String),
    #[error("Verification error")]
    VerificationError,
    #[error("Invalid token for email verification")]
    InvalidEmailToken,
    #[error("User with email {0} is not registered")]
    NotRegistered(String),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for AuthApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for AuthApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthApiError::ValidationError(_) | AuthApiError::InvalidEmailToken => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AuthApiError::AccountExists => StatusCode::CONFLICT,
            AuthApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthApiError::VerificationError => StatusCode::BAD_REQUEST,
            AuthApiError::NotRegistered(_) => StatusCode::NOT_FOUND,
            AuthApiError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AuthApiError::UnexpectedError(_) => {
                error_detail(self.status_code(), "Internal Server Error")
            }
            _ => error_detail(self.status_code(), &self.to_string()),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

/// A fresh access/refresh pair for `email`.
fn issue_tokens(tokens: &TokenService, email: &str) -> Result<TokenResponse, anyhow::Error> {
    Ok(TokenResponse {
        access_token: tokens
            .create_access_token(email)
            .context("Failed to issue an access token")?,
        refresh_token: tokens
            .create_refresh_token(email)
            .context("Failed to issue a refresh token")?,
        token_type: "bearer".into(),
    })
}

/// Send the confirmation email in the background: the request that
/// triggered it does not wait for, nor fail on, the delivery.
fn queue_confirmation_email(
    email_client: web::Data<EmailClient>,
    tokens: web::Data<TokenService>,
    base_url: web::Data<ApplicationBaseUrl>,
    recipient: EmailAddress,
    username: String,
) {
    let span = tracing::Span::current();
    actix_web::rt::spawn(
        async move {
            if let Err(e) = send_confirmation_email(
                &email_client,
                &tokens,
                &base_url.0,
                &recipient,
                &username,
            )
            .await
            {
                tracing::error!(
                    error.cause_chain = ?e,
                    error.message = %e,
                    "Failed to send a confirmation email"
                );
            }
        }
        .instrument(span),
    );
}
