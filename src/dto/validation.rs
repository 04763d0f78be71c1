//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::{engine::MIN_ACCESS_CODE_LENGTH, game::ROUND_COUNT};

/// Longest accepted username, in characters.
pub const MAX_USERNAME_LENGTH: usize = 32;
/// Longest accepted solution attempt, in characters.
pub const MAX_ATTEMPT_LENGTH: usize = 64;

/// Validates that a username is non-blank, short, and free of control characters.
///
/// # Examples
///
/// ```ignore
/// validate_username("ada")      // Ok
/// validate_username("   ")      // Err - blank
/// validate_username("a\u{7}b")  // Err - control character
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("username_required");
        err.message = Some("Username is required".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_USERNAME_LENGTH {
        let mut err = ValidationError::new("username_length");
        err.message = Some(
            format!("Username must be at most {MAX_USERNAME_LENGTH} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("username_format");
        err.message = Some("Username must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that an access code has at least four alphanumeric characters.
pub fn validate_access_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.chars().count() < MIN_ACCESS_CODE_LENGTH {
        let mut err = ValidationError::new("access_code_length");
        err.message = Some(
            format!("Access code must be at least {MIN_ACCESS_CODE_LENGTH} characters").into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("access_code_format");
        err.message = Some("Access code must be alphanumeric".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a round identifier is within 1..=6.
pub fn validate_round_id(round_id: u8) -> Result<(), ValidationError> {
    if (1..=ROUND_COUNT).contains(&usize::from(round_id)) {
        Ok(())
    } else {
        let mut err = ValidationError::new("round_id_range");
        err.message = Some(format!("Round ID must be between 1 and {ROUND_COUNT}").into());
        Err(err)
    }
}

/// Validates that a solution attempt is present and reasonably short.
pub fn validate_attempt(attempt: &str) -> Result<(), ValidationError> {
    if attempt.is_empty() || attempt.chars().count() > MAX_ATTEMPT_LENGTH {
        let mut err = ValidationError::new("attempt_length");
        err.message =
            Some(format!("Attempt must be 1 to {MAX_ATTEMPT_LENGTH} characters").into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ada").is_ok());
        assert!(validate_username("  bob  ").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username("a\u{7}b").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_access_code() {
        assert!(validate_access_code("ab12").is_ok());
        assert!(validate_access_code("abc").is_err()); // too short
        assert!(validate_access_code("ab 12").is_err()); // space
    }

    #[test]
    fn test_validate_round_id() {
        assert!(validate_round_id(1).is_ok());
        assert!(validate_round_id(6).is_ok());
        assert!(validate_round_id(0).is_err());
        assert!(validate_round_id(7).is_err());
    }
}
