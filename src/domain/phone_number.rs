#[derive(Debug, Clone)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Accepts digits, spaces and the usual `+ - ( )` separators.
    pub fn parse(s: String) -> Result<PhoneNumber, String> {
        let s = s.trim().to_string();
        let allowed = |c: char| c.is_ascii_digit() || " +-()".contains(c);
        let has_digit = s.chars().any(|c| c.is_ascii_digit());

        if s.is_empty() || s.chars().count() > 20 || !has_digit || !s.chars().all(allowed)
        {
            Err(format!("{} is not a valid phone number.", s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
