use secrecy::{ExposeSecret, Secret};

use crate::domain::EmailAddress;
use crate::domain::UserName;

#[derive(Debug)]
pub struct NewUser {
    pub email: EmailAddress,
    pub name: UserName,
    pub password: Password,
}

/// Plain-text password as received on sign-up, between 6 and 64 characters.
#[derive(Debug)]
pub struct Password(Secret<String>);

impl Password {
    pub fn parse(s: Secret<String>) -> Result<Password, String> {
        let length = s.expose_secret().chars().count();
        if (6..=64).contains(&length) {
            Ok(Self(s))
        } else {
            Err("Password must be between 6 and 64 characters long.".into())
        }
    }

    pub fn into_secret(self) -> Secret<String> {
        self.0
    }
}
