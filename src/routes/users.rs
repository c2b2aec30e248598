use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use anyhow::Context;
use futures::TryStreamExt;
use sqlx::PgPool;
use uuid::Uuid;

use crate::authentication::CurrentUser;
use crate::cloudinary::CloudinaryClient;
use crate::rate_limit::{RateLimitExceeded, RateLimits};
use crate::repository::users::{self as repository_users, User};
use crate::routes::error_chain_fmt;
use crate::utils::error_detail;

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Public view of a user: no password hash, no tokens.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

#[derive(thiserror::Error)]
pub enum UserApiError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),
    #[error("{0}")]
    ValidationError(String),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for UserApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for UserApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            UserApiError::RateLimited(e) => e.status_code(),
            UserApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UserApiError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            UserApiError::UnexpectedError(_) => {
                error_detail(self.status_code(), "Internal Server Error")
            }
            _ => error_detail(self.status_code(), &self.to_string()),
        }
    }
}

#[tracing::instrument(name = "Get current user", skip_all, fields(user_id = %user.id))]
pub async fn myself(
    request: HttpRequest,
    user: web::ReqData<CurrentUser>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, UserApiError> {
    limits.myself.check(&request)?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&**user)))
}

#[tracing::instrument(name = "Change avatar", skip_all, fields(user_id = %user.id))]
pub async fn change_avatar(
    request: HttpRequest,
    payload: Multipart,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
    cloudinary: web::Data<CloudinaryClient>,
    limits: web::Data<RateLimits>,
) -> Result<HttpResponse, UserApiError> {
    limits.change_avatar.check(&request)?;
    let user = user.into_inner();

    let (content_type, image) = read_file_field(payload)
        .await?
        .ok_or_else(|| UserApiError::ValidationError("A 'file' field is required".into()))?;

    let public_id = cloudinary.avatar_public_id(&user.email);
    let url = cloudinary
        .upload_avatar(&public_id, &content_type, &image)
        .await?;

    let user = repository_users::update_avatar_url(&user.email, Some(&url), &pool)
        .await
        .context("Failed to store the avatar url")?
        .context("The user disappeared while changing avatar")?;

    Ok(HttpResponse::Ok().json(UserResponse::from(&user)))
}

// Content type and bytes of the multipart field named `file`.
async fn read_file_field(
    mut payload: Multipart,
) -> Result<Option<(String, Vec<u8>)>, UserApiError> {
    let invalid = |e: actix_multipart::MultipartError| UserApiError::ValidationError(e.to_string());

    while let Some(mut field) = payload.try_next().await.map_err(invalid)? {
        let is_file = field.content_disposition().get_name() == Some("file");
        let content_type = field.content_type().to_string();
        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(invalid)? {
            if is_file {
                if bytes.len() + chunk.len() > MAX_AVATAR_BYTES {
                    return Err(UserApiError::ValidationError(
                        "The avatar must be at most 5 MiB".into(),
                    ));
                }
                bytes.extend_from_slice(&chunk);
            }
        }
        if is_file {
            if bytes.is_empty() {
                return Err(UserApiError::ValidationError("The file is empty".into()));
            }
            return Ok(Some((content_type, bytes)));
        }
    }
    Ok(None)
}
