//! Credentials and tokens: argon2 password hashes, JWT access, refresh and
//! email-verification tokens, and the middleware that resolves the
//! current user from a bearer token.
pub mod middleware;
mod password;
mod token;

pub use middleware::{bearer_token, reject_anonymous_users, CurrentUser};
pub use password::{compute_password_hash, hash_password, verify_password, AuthError};
pub use token::{Claims, TokenError, TokenScope, TokenService};
