//! src/email_client.rs
//!
//! Outbound email over the Postmark HTTP API, plus the confirmation
//! message sent to new users.
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

use crate::authentication::TokenService;
use crate::domain::EmailAddress;

pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: EmailAddress,
    authorization_token: Secret<String>,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: EmailAddress,
        authorization_token: Secret<String>,
        timeout: std::time::Duration,
    ) -> Self {
        let http_client = Client::builder().timeout(timeout).build().unwrap();
        Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        }
    }

    pub async fn send_email(
        &self,
        recipient: &EmailAddress,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/email", self.base_url);
        let request_body = SendEmailRequest {
            from: self.sender.as_ref(),
            to: recipient.as_ref(),
            subject,
            html_body: html_content,
            text_body: text_content,
        };
        self.http_client
            .post(&url)
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

/// Issue an email verification token for `recipient` and mail them the
/// link that confirms their address.
#[tracing::instrument(
    name = "Send a confirmation email to a new user",
    skip(email_client, tokens, base_url)
)]
pub async fn send_confirmation_email(
    email_client: &EmailClient,
    tokens: &TokenService,
    base_url: &str,
    recipient: &EmailAddress,
    username: &str,
) -> Result<(), anyhow::Error> {
    let email_token = tokens.create_email_token(recipient.as_ref())?;
    let confirmation_link =
        format!("{}/api/auth/confirmed_email/{}", base_url, email_token);
    let html_body = format!(
        "Hello {},<br />\
        Welcome to the Contact Book!<br />\
        Click <a href=\"{}\">here</a> to confirm your email address.",
        username, confirmation_link
    );
    let plain_body = format!(
        "Hello {},\nWelcome to the Contact Book!\n\
        Visit {} to confirm your email address.",
        username, confirmation_link
    );
    email_client
        .send_email(recipient, "Confirm your email", &html_body, &plain_body)
        .await?;
    Ok(())
}
