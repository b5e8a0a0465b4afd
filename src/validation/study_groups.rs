use crate::error::{AppError, Result};

/// Validates a study group title.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    if title.len() > 200 {
        return Err(AppError::Validation(
            "Title must be at most 200 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validates a subject or schedule description. Both may be empty.
pub fn validate_descriptive_field(label: &str, value: &str) -> Result<()> {
    if value.len() > 200 {
        return Err(AppError::Validation(format!(
            "{} must be at most 200 characters",
            label
        )));
    }

    Ok(())
}

/// Validates the user id carried in lifecycle request bodies.
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(AppError::Validation("User ID is required".to_string()));
    }

    if user_id.len() > 64 {
        return Err(AppError::Validation(
            "User ID must be at most 64 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validates a group's shared session password. Empty means the group is
/// open.
pub fn validate_group_password(password: &str) -> Result<()> {
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
    fn title_rules() {
        assert!(validate_title("Pharma drill").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"t".repeat(201)).is_err());
    }

    #[test]
    fn user_id_rules() {
        assert!(validate_user_id("2024-00123").is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(&"u".repeat(65)).is_err());
    }

    #[test]
    fn group_password_rules() {
        assert!(validate_group_password("").is_ok());
        assert!(validate_group_password("secret").is_ok());
        assert!(validate_group_password(&"p".repeat(129)).is_err());
    }
}
