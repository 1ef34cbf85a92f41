//! Validation helpers for account credentials.

use std::borrow::Cow;

use validator::ValidationError;

/// Minimum password length requirement
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length to keep bcrypt input bounded
const MAX_PASSWORD_LENGTH: usize = 128;

fn failure(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// Validate account password strength
/// Requirements:
/// - 8 to 128 characters
/// - at least one lowercase letter, one uppercase letter, one digit
/// - at least one special character
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(failure("password_too_short", "Password must be at least 8 characters"));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(failure("password_too_long", "Password must be at most 128 characters"));
    }

    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !(has_uppercase && has_lowercase && has_digit && has_special) {
        return Err(failure(
            "password_too_weak",
            "Password must contain uppercase, lowercase, number and special character",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_complex_password() {
        assert!(validate_password("Admin123!").is_ok());
    }

    #[test]
    fn rejects_weak_passwords() {
        assert_eq!(validate_password("Ab1!").unwrap_err().code, "password_too_short");
        assert!(validate_password("alllowercase1!").is_err());
        assert!(validate_password("ALLUPPERCASE1!").is_err());
        assert!(validate_password("NoDigitsHere!").is_err());
        assert!(validate_password("NoSpecial123").is_err());
        assert_eq!(
            validate_password(&format!("Aa1!{}", "x".repeat(125))).unwrap_err().code,
            "password_too_long"
        );
    }
}
