use std::ops::Deref;

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, HeaderMap};
use actix_web::http::StatusCode;
use actix_web::{web, HttpMessage, HttpResponse, ResponseError};
use actix_web_lab::middleware::Next;
use anyhow::Context;
use sqlx::PgPool;

use crate::authentication::{AuthError, TokenService};
use crate::repository::users::{get_user_by_email, User};
use crate::utils::error_detail;

/// The user owning the access token of the current request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

impl Deref for CurrentUser {
    type Target = User;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AuthError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AuthError::InvalidCredentials(_) => {
                let mut response = error_detail(
                    StatusCode::UNAUTHORIZED,
                    "Could not validate credentials",
                );
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    header::HeaderValue::from_static("Bearer"),
                );
                response
            }
            AuthError::UnexpectedError(_) => {
                error_detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

/// Extract the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, anyhow::Error> {
    // Header value, if present, must be valid UTF8 string
    let header_value = headers
        .get(header::AUTHORIZATION)
        .context("The 'Authorization' header was missing")?
        .to_str()
        .context("The 'Authorization' header was not a valid UTF8 string.")?;

    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .context("The authorization scheme was not 'Bearer'.")
}

pub async fn reject_anonymous_users(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let user = authenticate(&req).await?;
    req.extensions_mut().insert(CurrentUser(user));
    next.call(req).await
}

#[tracing::instrument(name = "Authenticate bearer token", skip(req))]
async fn authenticate(req: &ServiceRequest) -> Result<User, AuthError> {
    let token = bearer_token(req.headers()).map_err(AuthError::InvalidCredentials)?;
    let tokens = req
        .app_data::<web::Data<TokenService>>()
        .context("The token service is not registered")?;
    let pool = req
        .app_data::<web::Data<PgPool>>()
        .context("The connection pool is not registered")?;

    let email = tokens
        .decode_access_token(token)
        .map_err(|e| AuthError::InvalidCredentials(e.into()))?;

    get_user_by_email(&email, pool.get_ref())
        .await
        .context("Failed to retrieve the owner of the access token")?
        .ok_or_else(|| AuthError::InvalidCredentials(anyhow::anyhow!("Unknown user")))
}
