use chrono::NaiveDate;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::{ContactName, EmailAddress, PhoneNumber};

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: ContactName,
    pub lastname: ContactName,
    pub email: EmailAddress,
    pub phone: PhoneNumber,
    pub birthday: NaiveDate,
    pub notes: ContactNotes,
    pub favourite: bool,
}

#[derive(Debug, Clone)]
pub struct ContactNotes(String);

impl ContactNotes {
    pub fn parse(s: String) -> Result<ContactNotes, String> {
        if s.graphemes(true).count() > 250 {
            Err("Notes must be at most 250 characters long.".into())
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for ContactNotes {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
