use unicode_segmentation::UnicodeSegmentation;

/// First or last name of a contact, 3 to 50 graphemes.
#[derive(Debug, Clone)]
pub struct ContactName(String);

impl ContactName {
    pub fn parse(s: String) -> Result<ContactName, String> {
        let s = s.trim().to_string();
        let length = s.graphemes(true).count();
        if (3..=50).contains(&length) {
            Ok(Self(s))
        } else {
            Err(format!(
                "'{}' must be between 3 and 50 characters long.",
                s
            ))
        }
    }
}

impl AsRef<str> for ContactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
