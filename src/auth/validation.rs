//! Input validation for account sign-up and character naming.

use std::collections::HashSet;

use crate::errors::EngineError;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_USER_ID_LEN: usize = 32;
pub const MAX_DISPLAY_NAME_LEN: usize = 30;

/// Sign-up and naming failures with helpful messages.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("user id is too long (maximum {max} characters)")]
    UserIdTooLong { max: usize },

    #[error("user id may only contain lowercase letters and digits (found: {chars})")]
    InvalidUserIdCharacters { chars: String },

    #[error("password is too short (minimum {min} characters)")]
    PasswordTooShort { min: usize },

    #[error("password confirmation is required")]
    MissingPasswordCheck,

    #[error("password confirmation does not match")]
    PasswordMismatch,

    #[error("name must not be empty")]
    EmptyName,

    #[error("name is too long (maximum {max} characters)")]
    NameTooLong { max: usize },

    #[error("name contains control characters")]
    NameControlCharacters,
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::InvalidInput(e.to_string())
    }
}

/// User ids are non-empty lowercase ASCII letters and digits.
pub fn validate_user_id(user_id: &str) -> Result<&str, ValidationError> {
    if user_id.is_empty() {
        return Err(ValidationError::EmptyUserId);
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(ValidationError::UserIdTooLong {
            max: MAX_USER_ID_LEN,
        });
    }
    let invalid: HashSet<char> = user_id
        .chars()
        .filter(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .collect();
    if !invalid.is_empty() {
        let mut chars: Vec<char> = invalid.into_iter().collect();
        chars.sort_unstable();
        return Err(ValidationError::InvalidUserIdCharacters {
            chars: chars.into_iter().collect(),
        });
    }
    Ok(user_id)
}

pub fn validate_password(password: &str, check: Option<&str>) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    match check {
        None => Err(ValidationError::MissingPasswordCheck),
        Some(check) if check != password => Err(ValidationError::PasswordMismatch),
        Some(_) => Ok(()),
    }
}

/// Display names (account and character) are trimmed, non-empty and single-line.
pub fn validate_display_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(ValidationError::NameTooLong {
            max: MAX_DISPLAY_NAME_LEN,
        });
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::NameControlCharacters);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rules() {
        assert!(validate_user_id("ayla42").is_ok());
        assert_eq!(validate_user_id(""), Err(ValidationError::EmptyUserId));
        assert_eq!(
            validate_user_id("Ayla_1"),
            Err(ValidationError::InvalidUserIdCharacters {
                chars: "A_".to_string()
            })
        );
        assert!(matches!(
            validate_user_id(&"a".repeat(40)),
            Err(ValidationError::UserIdTooLong { .. })
        ));
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("secret", Some("secret")).is_ok());
        assert!(matches!(
            validate_password("short", Some("short")),
            Err(ValidationError::PasswordTooShort { .. })
        ));
        assert_eq!(
            validate_password("secret", None),
            Err(ValidationError::MissingPasswordCheck)
        );
        assert_eq!(
            validate_password("secret", Some("secreT")),
            Err(ValidationError::PasswordMismatch)
        );
    }

    #[test]
    fn display_names_are_trimmed() {
        assert_eq!(validate_display_name("  Brom ").unwrap(), "Brom");
        assert_eq!(validate_display_name("   "), Err(ValidationError::EmptyName));
        assert_eq!(
            validate_display_name("Br\nom"),
            Err(ValidationError::NameControlCharacters)
        );
    }

    #[test]
    fn validation_errors_are_invalid_input() {
        let err: EngineError = ValidationError::EmptyName.into();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidInput);
    }
}
