use crate::error::{AppError, Result};

/// Validates an id_number.
///
/// # Arguments
///
/// * `id_number` - The id_number to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the id_number is valid.
pub fn validate_id_number(id_number: &str) -> Result<()> {
    if id_number.is_empty() || id_number.len() < 3 {
        return Err(AppError::Validation(
            "ID number must be at least 3 characters long".to_string(),
        ));
    }

    if id_number.len() > 32 {
        return Err(AppError::Validation(
            "ID number must be at most 32 characters".to_string(),
        ));
    }

    if !id_number.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(AppError::Validation(
            "ID number can only contain letters, numbers, and hyphens".to_string(),
        ));
    }

    Ok(())
}

/// Validates a name component (first or last name).
pub fn validate_name(label: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", label)));
    }

    if name.len() > 100 {
        return Err(AppError::Validation(format!(
            "{} must be at most 100 characters",
            label
        )));
    }

    Ok(())
}

/// Validates an account password.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the password is valid.
pub fn validate_password(password: &str) -> Result<()> {
    if password.len() < 8 {
        return Err(AppError::Validation(
            "Password must be at least 8 characters long".to_string(),
        ));
    }

    if password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be at most 128 characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_number_rules() {
        assert!(validate_id_number("2024-00123").is_ok());
        assert!(validate_id_number("ab").is_err());
        assert!(validate_id_number("has spaces").is_err());
        assert!(validate_id_number(&"9".repeat(33)).is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }
}
