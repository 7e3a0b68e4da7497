use regex::Regex;
use std::sync::LazyLock;
use crate::error::{AppError, AppResult};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

static TICKET_NUMBER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]+(-[A-Za-z0-9]+)*$").expect("valid ticket number regex")
});

const MAX_TICKET_NUMBER_LEN: usize = 32;

/// 验证邮箱格式
pub fn validate_email(email: &str) -> AppResult<()> {
    if !EMAIL_REGEX.is_match(email) {
        return Err(AppError::ValidationError(
            "Please enter a valid email address".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> AppResult<()> {
    let len = username.trim().chars().count();
    if !(2..=32).contains(&len) {
        return Err(AppError::ValidationError(
            "Username must be between 2 and 32 characters".to_string(),
        ));
    }
    Ok(())
}

/// Ticket and winning numbers: alphanumeric groups joined by single hyphens.
pub fn validate_ticket_number(number: &str) -> AppResult<()> {
    if number.len() > MAX_TICKET_NUMBER_LEN || !TICKET_NUMBER_REGEX.is_match(number) {
        return Err(AppError::ValidationError(format!(
            "Invalid ticket number: {number:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alice@x.com").is_ok());
        assert!(validate_email("first.last+tag@mail.example.org").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("alice@x").is_err());
        assert!(validate_email(" alice@x.com").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("al").is_ok());
        assert!(validate_username("a").is_err());
        assert!(validate_username("  a ").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_validate_ticket_number() {
        assert!(validate_ticket_number("12-34-56-78-90").is_ok());
        assert!(validate_ticket_number("12-345").is_ok());
        assert!(validate_ticket_number("AbC123xYz0").is_ok());
        assert!(validate_ticket_number("").is_err());
        assert!(validate_ticket_number("12--34").is_err());
        assert!(validate_ticket_number("-12").is_err());
        assert!(validate_ticket_number("12 34").is_err());
        assert!(validate_ticket_number(&"1".repeat(33)).is_err());
    }
}
