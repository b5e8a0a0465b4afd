use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a platform account.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The human-facing student/instructor number. Unique.
    pub id_number: String,
    /// The user's first name.
    pub firstname: String,
    /// The user's last name.
    pub lastname: String,
    /// The user's email address.
    pub email: Option<String>,
    /// The review program the user is enrolled in.
    pub program: String,
    /// The user's hashed password.
    pub password: String,
    /// The user's role ("student", "instructor" or "admin").
    pub role: String,
    /// Whether the user is active.
    pub is_active: bool,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The user's display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}
