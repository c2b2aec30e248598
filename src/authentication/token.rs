use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::configuration::AuthSettings;

/// What a token may be used for. A token is only accepted where its
/// scope is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    AccessToken,
    RefreshToken,
    EmailToken,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Email of the user the token was issued to
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub scope: TokenScope,
    // Two tokens issued within the same second must still differ
    pub jti: String,
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("Could not validate credentials")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid scope for token")]
    WrongScope,
}

/// Issues and verifies HS256 JWTs.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    email_token_ttl: Duration,
}

impl TokenService {
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.secret_key.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_token_ttl: Duration::minutes(settings.access_token_minutes),
            refresh_token_ttl: Duration::days(settings.refresh_token_days),
            email_token_ttl: Duration::hours(settings.email_token_hours),
        }
    }

    pub fn create_access_token(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, TokenScope::AccessToken, self.access_token_ttl)
    }

    pub fn create_refresh_token(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, TokenScope::RefreshToken, self.refresh_token_ttl)
    }

    pub fn create_email_token(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, TokenScope::EmailToken, self.email_token_ttl)
    }

    /// Email of the owner of a valid access token.
    pub fn decode_access_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token, TokenScope::AccessToken)
    }

    pub fn decode_refresh_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token, TokenScope::RefreshToken)
    }

    pub fn get_email_from_token(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token, TokenScope::EmailToken)
    }

    fn issue(
        &self,
        email: &str,
        scope: TokenScope,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            scope,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    fn verify(&self, token: &str, scope: TokenScope) -> Result<String, TokenError> {
        let claims = decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )?
        .claims;
        if claims.scope != scope {
            return Err(TokenError::WrongScope);
        }
        Ok(claims.sub)
    }
}
