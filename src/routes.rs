//! HTTP handlers, grouped the way they are mounted under `/api`.
pub mod auth;
pub mod contacts;
mod health_check;
mod home;
pub mod users;

pub use health_check::*;
pub use home::*;

/// `{"message": ...}` body of informational responses.
#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
