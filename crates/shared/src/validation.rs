//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Allowed range for the per-company cap on open requests per agent.
pub const MIN_REQUESTS_PER_AGENT: i32 = 1;
pub const MAX_REQUESTS_PER_AGENT: i32 = 3;

lazy_static! {
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9]{6,15}$").unwrap();
    static ref PHONE_NOISE: Regex = Regex::new(r"[\s\-().]").unwrap();
}

/// Normalizes a phone number for storage and duplicate detection.
///
/// Spaces, dashes, dots and parentheses are removed; a leading `+` is kept.
pub fn normalize_phone(raw: &str) -> String {
    PHONE_NOISE.replace_all(raw.trim(), "").into_owned()
}

/// Validates a phone number after normalization.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(&normalize_phone(phone)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone must contain 6 to 15 digits, optionally prefixed by +".into());
        Err(err)
    }
}

/// Validates the per-agent request cap of a company.
pub fn validate_requests_per_agent(value: i32) -> Result<(), ValidationError> {
    if (MIN_REQUESTS_PER_AGENT..=MAX_REQUESTS_PER_AGENT).contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("requests_per_agent_range");
        err.message = Some(
            format!(
                "max_requests_per_agent must be between {} and {}",
                MIN_REQUESTS_PER_AGENT, MAX_REQUESTS_PER_AGENT
            )
            .into(),
        );
        Err(err)
    }
}

/// Validates a lead quality score (1 or higher).
pub fn validate_quality(quality: i32) -> Result<(), ValidationError> {
    if quality >= 1 {
        Ok(())
    } else {
        let mut err = ValidationError::new("quality_range");
        err.message = Some("Quality must be 1 or higher".into());
        Err(err)
    }
}

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_strips_noise() {
        assert_eq!(normalize_phone(" +34 600-111 222 "), "+34600111222");
        assert_eq!(normalize_phone("(600) 111.222"), "600111222");
        assert_eq!(normalize_phone("+34600111222"), "+34600111222");
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+34600111222").is_ok());
        assert!(validate_phone("600 11 12 22").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("+34abc111222").is_err());
        assert!(validate_phone("").is_err());
    }

    #[test]
    fn test_validate_requests_per_agent() {
        assert!(validate_requests_per_agent(1).is_ok());
        assert!(validate_requests_per_agent(3).is_ok());
        assert!(validate_requests_per_agent(0).is_err());
        assert!(validate_requests_per_agent(4).is_err());
    }

    #[test]
    fn test_validate_quality() {
        assert!(validate_quality(1).is_ok());
        assert!(validate_quality(5).is_ok());
        assert!(validate_quality(0).is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("motivo").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
