//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    /// Flag and variant keys: a letter followed by letters, digits or underscores.
    static ref KEY_REGEX: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").unwrap();
}

/// Upper bound of any percentage field (rollout, distribution).
pub const MAX_PERCENT: i64 = 100;

/// Returns true if `key` satisfies the identifier format.
pub fn is_valid_key(key: &str) -> bool {
    KEY_REGEX.is_match(key)
}

/// Validates that a key matches `^[a-zA-Z][a-zA-Z0-9_]*$`.
pub fn validate_key_format(key: &str) -> Result<(), ValidationError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        let mut err = ValidationError::new("key_format");
        err.message = Some(
            format!(
                "key '{}' must start with a letter and contain only letters, digits and underscores",
                key
            )
            .into(),
        );
        Err(err)
    }
}

/// Like [`validate_key_format`] but accepts the empty string, which means the
/// key is server-generated.
pub fn validate_optional_key_format(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Ok(());
    }
    validate_key_format(key)
}

/// Validates that a percentage is within 0..=100.
pub fn validate_percent(percent: i64) -> Result<(), ValidationError> {
    if (0..=MAX_PERCENT).contains(&percent) {
        Ok(())
    } else {
        let mut err = ValidationError::new("percent_range");
        err.message = Some("Percent must be between 0 and 100".into());
        Err(err)
    }
}
