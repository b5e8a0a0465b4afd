use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// A study group and its live-session state.
///
/// Membership (`members`) is permanent until a user explicitly leaves;
/// `active_participants` tracks who is present in the current live session
/// and may legitimately be empty while `is_session_active` is still true
/// (the inactivity countdown is running).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyGroup {
    /// The unique identifier for the group.
    pub id: Uuid,
    /// The group's title.
    pub title: String,
    /// The subject being studied.
    pub subject: String,
    /// Free-text schedule description.
    pub schedule: String,
    /// Optional plaintext shared secret gating session join. Empty = open.
    pub password: String,
    /// The id_number of the user who created the group.
    pub creator_id: String,
    /// id_numbers of everyone who has joined the group. Set semantics.
    pub members: Vec<String>,
    /// Soft capacity hint recorded at creation. Not enforced.
    pub max_members: i32,
    /// Whether a live session has been started and not yet ended.
    pub is_session_active: bool,
    /// When the current session began. Cleared when the session is ended.
    pub session_started_at: Option<DateTime<Utc>>,
    /// id_numbers currently present in the live session. Set semantics.
    pub active_participants: Vec<String>,
    /// Refreshed on join/leave/activity ping. Drives the inactivity cutoff.
    pub last_activity: DateTime<Utc>,
    /// Grace period recorded at creation, in minutes.
    pub auto_delete_minutes: i64,
    /// The timestamp when the group was created.
    pub created_at: DateTime<Utc>,
}

impl StudyGroup {
    /// Returns the number of active participants.
    pub fn participant_count(&self) -> usize {
        self.active_participants.len()
    }

    /// Whether joining the session requires a password.
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// Whole minutes elapsed since the last recorded activity.
    pub fn minutes_since_activity(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_minutes()
    }

    /// Whether the inactivity sweep would delete this group at `cutoff`.
    pub fn is_reapable(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_session_active
            && self.active_participants.is_empty()
            && self.last_activity < cutoff
    }
}

impl From<&Row> for StudyGroup {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            title: row.get("title"),
            subject: row.get("subject"),
            schedule: row.get("schedule"),
            password: row.get("password"),
            creator_id: row.get("creator_id"),
            members: row.get("members"),
            max_members: row.get("max_members"),
            is_session_active: row.get("is_session_active"),
            session_started_at: row.get("session_started_at"),
            active_participants: row.get("active_participants"),
            last_activity: row.get("last_activity"),
            auto_delete_minutes: row.get("auto_delete_minutes"),
            created_at: row.get("created_at"),
        }
    }
}
