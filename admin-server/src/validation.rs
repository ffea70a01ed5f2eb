//! Input validation helpers
//!
//! Text length limits and the field checks shared by the catalog handlers.
//! PostgreSQL TEXT has no length enforcement, so the limits live here.

use rust_decimal::Decimal;
use shared::error::AppError;

/// Titles and names: FAQ titles, categories, services, games
pub const MAX_NAME_LEN: usize = 200;

/// Short descriptions, subtitles, footer lines
pub const MAX_NOTE_LEN: usize = 500;

/// FAQ answers, policy sections, disclaimers
pub const MAX_CONTENT_LEN: usize = 20_000;

/// Icon names, logo text
pub const MAX_SHORT_TEXT_LEN: usize = 100;

/// Image URLs, links
pub const MAX_URL_LEN: usize = 2048;

/// Lines of a service description
pub const MAX_LIST_ITEMS: usize = 50;

/// Validate that a required string is non-empty and within the length limit.
pub fn validate_required_text(value: &str, field: &str, max_len: usize) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::invalid_field(field, format!("{field} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AppError::invalid_field(
            field,
            format!("{field} is too long ({} chars, max {max_len})", value.len()),
        ));
    }
    Ok(())
}

/// Validate that an optional string, if present, is within the length limit.
pub fn validate_optional_text(
    value: &Option<String>,
    field: &str,
    max_len: usize,
) -> Result<(), AppError> {
    if let Some(v) = value
        && v.len() > max_len
    {
        return Err(AppError::invalid_field(
            field,
            format!("{field} is too long ({} chars, max {max_len})", v.len()),
        ));
    }
    Ok(())
}

/// Validate an absolute http(s) URL.
pub fn validate_url(value: &str, field: &str) -> Result<(), AppError> {
    validate_required_text(value, field, MAX_URL_LEN)?;
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    let has_host = rest.is_some_and(|host| !host.is_empty() && !host.starts_with('/'));
    match rest {
        Some(_) if has_host && !value.contains(char::is_whitespace) => Ok(()),
        _ => Err(AppError::invalid_field(
            field,
            format!("{field} must be an http or https URL"),
        )),
    }
}

/// Validate a non-empty list of non-empty lines.
pub fn validate_text_list(values: &[String], field: &str, max_len: usize) -> Result<(), AppError> {
    if values.is_empty() {
        return Err(AppError::invalid_field(field, format!("{field} must not be empty")));
    }
    if values.len() > MAX_LIST_ITEMS {
        return Err(AppError::invalid_field(
            field,
            format!("{field} has too many entries (max {MAX_LIST_ITEMS})"),
        ));
    }
    for value in values {
        validate_required_text(value, field, max_len)?;
    }
    Ok(())
}

pub fn validate_price(value: Decimal, field: &str) -> Result<(), AppError> {
    if value.is_sign_negative() {
        return Err(AppError::invalid_field(field, format!("{field} must not be negative")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorCode;

    #[test]
    fn required_text() {
        assert!(validate_required_text("Boosting", "name", MAX_NAME_LEN).is_ok());
        let err = validate_required_text("   ", "name", MAX_NAME_LEN).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.details.unwrap()["field"], "name");
        assert!(validate_required_text(&"x".repeat(201), "name", MAX_NAME_LEN).is_err());
    }

    #[test]
    fn urls() {
        assert!(validate_url("https://cdn.example.com/a.png", "image").is_ok());
        assert!(validate_url("http://localhost:3000/x.webp", "image").is_ok());
        assert!(validate_url("ftp://example.com/a.png", "image").is_err());
        assert!(validate_url("https://", "image").is_err());
        assert!(validate_url("https://a.com/with space.png", "image").is_err());
    }

    #[test]
    fn lists_and_prices() {
        assert!(validate_text_list(&["Fast".into()], "description", MAX_NOTE_LEN).is_ok());
        assert!(validate_text_list(&[], "description", MAX_NOTE_LEN).is_err());
        assert!(validate_text_list(&["".into()], "description", MAX_NOTE_LEN).is_err());
        assert!(validate_price(Decimal::new(1999, 2), "price").is_ok());
        assert!(validate_price(Decimal::new(-1, 0), "price").is_err());
    }
}
