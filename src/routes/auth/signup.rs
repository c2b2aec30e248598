use actix_web::{web, HttpResponse};
use anyhow::Context;
use secrecy::Secret;
use sqlx::PgPool;

use super::{queue_confirmation_email, AuthApiError};
use crate::authentication::{hash_password, TokenService};
use crate::domain::{EmailAddress, NewUser, Password, UserName};
use crate::email_client::EmailClient;
use crate::repository::users as repository_users;
use crate::routes::users::UserResponse;
use crate::startup::ApplicationBaseUrl;

#[derive(serde::Deserialize)]
pub struct SignupBody {
    username: String,
    email: String,
    password: Secret<String>,
}

impl TryFrom<SignupBody> for NewUser {
    type Error = String;

    fn try_from(value: SignupBody) -> Result<Self, Self::Error> {
        let name = UserName::parse(value.username)?;
        let email = EmailAddress::parse(value.email)?;
        let password = Password::parse(value.password)?;
        Ok(Self {
            email,
            name,
            password,
        })
    }
}

#[tracing::instrument(
    name = "Sign up a new user",
    skip(body, pool, email_client, tokens, base_url),
    fields(
        user_email = %body.email,
        username = %body.username
    )
)]
pub async fn signup(
    body: web::Json<SignupBody>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    tokens: web::Data<TokenService>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, AuthApiError> {
    let new_user: NewUser = body
        .into_inner()
        .try_into()
        .map_err(AuthApiError::ValidationError)?;
    // The password is consumed by hashing, the rest is stored as is
    let NewUser {
        email,
        name,
        password,
    } = new_user;

    if repository_users::get_user_by_email(email.as_ref(), &pool)
        .await
        .context("Failed to look up existing accounts")?
        .is_some()
    {
        return Err(AuthApiError::AccountExists);
    }

    let password_hash = hash_password(password.into_secret()).await?;
    let user = repository_users::create_user(&name, &email, &password_hash, &pool)
        .await
        .map_err(|e| {
            // Lost a race against a concurrent sign-up with the same email
            let unique_violation = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
            );
            if unique_violation {
                AuthApiError::AccountExists
            } else {
                AuthApiError::UnexpectedError(
                    anyhow::Error::new(e).context("Failed to store the new user"),
                )
            }
        })?;

    queue_confirmation_email(
        email_client,
        tokens,
        base_url,
        email,
        user.username.clone(),
    );

    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}
