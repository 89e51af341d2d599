use lazy_static::lazy_static;
use regex::Regex;

use super::error::SessionError;

pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$")
            .unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

pub fn check_email(email: &str) -> Result<(), SessionError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(SessionError::InvalidEmail)
    }
}

/// Length is counted in characters, not bytes.
pub fn check_password(password: &str) -> Result<(), SessionError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        Err(SessionError::PasswordTooShort)
    } else {
        Ok(())
    }
}

/// Account name the server knows a user by: the local part of the email,
/// dots turned into underscores, lowercased.
pub fn username_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or_default()
        .replace('.', "_")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        for email in [
            "alice@example.com",
            "first.last+tag@sub.example.org",
            "a_b-c@x-y.io",
        ] {
            assert!(is_valid_email(email), "{email}");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in [
            "",
            "alice",
            "alice@",
            "@example.com",
            "alice@example",
            " alice@example.com",
            "alice@example.com ",
            "al ice@example.com",
            "alice@@example.com",
        ] {
            assert!(!is_valid_email(email), "{email:?}");
        }
    }

    #[test]
    fn password_length_boundary() {
        assert!(matches!(
            check_password("1234567"),
            Err(SessionError::PasswordTooShort)
        ));
        assert!(check_password("12345678").is_ok());
        // 7 characters, 14 bytes
        assert!(check_password("ééééééé").is_err());
        assert!(check_password("éééééééé").is_ok());
    }

    #[test]
    fn usernames_derive_from_local_part() {
        assert_eq!(username_from_email("John.Doe@example.com"), "john_doe");
        assert_eq!(username_from_email("bob@example.com"), "bob");
    }
}
