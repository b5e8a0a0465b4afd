use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::study_group::StudyGroup,
};

/// Storage operations for study groups.
///
/// Every mutation is a single guarded statement so that concurrent requests
/// against the same group only rely on per-row atomicity, never on
/// application-level locking. The Postgres implementation is used in
/// production; tests substitute an in-memory fake.
#[async_trait]
pub trait StudyGroupRepository: Send + Sync {
    /// Persists a freshly created group.
    async fn insert(&self, group: &StudyGroup) -> Result<()>;

    /// Point lookup by group id.
    async fn find(&self, group_id: &Uuid) -> Result<Option<StudyGroup>>;

    /// All groups, newest first.
    async fn all(&self) -> Result<Vec<StudyGroup>>;

    /// Groups with a live session.
    async fn active(&self) -> Result<Vec<StudyGroup>>;

    /// Groups the given user is a member of.
    async fn for_member(&self, user_id: &str) -> Result<Vec<StudyGroup>>;

    /// Adds a member. Duplicates are suppressed at the statement level.
    async fn add_member(&self, group_id: &Uuid, user_id: &str) -> Result<()>;

    /// Removes a member. Removing a non-member is a no-op.
    async fn remove_member(&self, group_id: &Uuid, user_id: &str) -> Result<()>;

    /// Adds an active participant and refreshes `last_activity`.
    /// Duplicates are suppressed at the statement level.
    async fn add_participant(&self, group_id: &Uuid, user_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Removes an active participant.
    async fn remove_participant(&self, group_id: &Uuid, user_id: &str) -> Result<()>;

    /// Marks the session started by `user_id`: the participant set is reset
    /// to the starter alone and both timestamps are refreshed.
    async fn begin_session(&self, group_id: &Uuid, user_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Marks the session ended without deleting the group.
    async fn end_session(&self, group_id: &Uuid) -> Result<()>;

    /// Unconditionally empties the participant set and refreshes
    /// `last_activity`, restarting the inactivity countdown.
    async fn clear_participants(&self, group_id: &Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Refreshes `last_activity`. Returns false when the group is gone.
    async fn touch_activity(&self, group_id: &Uuid, at: DateTime<Utc>) -> Result<bool>;

    /// Deletes a group. Returns false when the group was already gone.
    async fn delete(&self, group_id: &Uuid) -> Result<bool>;

    /// Deletes every group, returning how many were removed.
    async fn delete_all(&self) -> Result<u64>;

    /// Groups whose empty live session idled past `cutoff`.
    async fn expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<StudyGroup>>;

    /// Groups that are inactive or have no active participants.
    async fn idle(&self) -> Result<Vec<StudyGroup>>;
}

/// The production `StudyGroupRepository`, backed by PostgreSQL.
pub struct PgStudyGroupRepository {
    pool: Pool,
}

impl PgStudyGroupRepository {
    /// Creates a repository over the given connection pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudyGroupRepository for PgStudyGroupRepository {
    async fn insert(&self, group: &StudyGroup) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                INSERT INTO study_groups (
                    id, title, subject, schedule, password, creator_id, members,
                    max_members, is_session_active, session_started_at,
                    active_participants, last_activity, auto_delete_minutes, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
                &[
                    &group.id,
                    &group.title,
                    &group.subject,
                    &group.schedule,
                    &group.password,
                    &group.creator_id,
                    &group.members,
                    &group.max_members,
                    &group.is_session_active,
                    &group.session_started_at,
                    &group.active_participants,
                    &group.last_activity,
                    &group.auto_delete_minutes,
                    &group.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn find(&self, group_id: &Uuid) -> Result<Option<StudyGroup>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT *
                FROM study_groups
                WHERE id = $1
                "#,
                &[group_id],
            )
            .await?;
        Ok(row.as_ref().map(StudyGroup::from))
    }

    async fn all(&self) -> Result<Vec<StudyGroup>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *
                FROM study_groups
                ORDER BY created_at DESC
                "#,
                &[],
            )
            .await?;
        Ok(rows.iter().map(StudyGroup::from).collect())
    }

    async fn active(&self) -> Result<Vec<StudyGroup>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *
                FROM study_groups
                WHERE is_session_active = true
                ORDER BY created_at DESC
                "#,
                &[],
            )
            .await?;
        Ok(rows.iter().map(StudyGroup::from).collect())
    }

    async fn for_member(&self, user_id: &str) -> Result<Vec<StudyGroup>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *
                FROM study_groups
                WHERE $1 = ANY(members)
                ORDER BY created_at DESC
                "#,
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(StudyGroup::from).collect())
    }

    async fn add_member(&self, group_id: &Uuid, user_id: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE study_groups
                SET members = array_append(members, $2)
                WHERE id = $1 AND NOT ($2 = ANY(members))
                "#,
                &[group_id, &user_id],
            )
            .await?;
        Ok(())
    }

    async fn remove_member(&self, group_id: &Uuid, user_id: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE study_groups
                SET members = array_remove(members, $2)
                WHERE id = $1
                "#,
                &[group_id, &user_id],
            )
            .await?;
        Ok(())
    }

    async fn add_participant(&self, group_id: &Uuid, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE study_groups
                SET active_participants = array_append(active_participants, $2),
                    last_activity = $3
                WHERE id = $1 AND NOT ($2 = ANY(active_participants))
                "#,
                &[group_id, &user_id, &at],
            )
            .await?;
        Ok(())
    }

    async fn remove_participant(&self, group_id: &Uuid, user_id: &str) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE study_groups
                SET active_participants = array_remove(active_participants, $2)
                WHERE id = $1
                "#,
                &[group_id, &user_id],
            )
            .await?;
        Ok(())
    }

    async fn begin_session(&self, group_id: &Uuid, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE study_groups
                SET is_session_active = true,
                    session_started_at = $3,
                    last_activity = $3,
                    active_participants = ARRAY[$2::text]
                WHERE id = $1
                "#,
                &[group_id, &user_id, &at],
            )
            .await?;
        Ok(())
    }

    async fn end_session(&self, group_id: &Uuid) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE study_groups
                SET is_session_active = false,
                    session_started_at = NULL,
                    active_participants = '{}'
                WHERE id = $1
                "#,
                &[group_id],
            )
            .await?;
        Ok(())
    }

    async fn clear_participants(&self, group_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                r#"
                UPDATE study_groups
                SET active_participants = '{}',
                    last_activity = $2
                WHERE id = $1
                "#,
                &[group_id, &at],
            )
            .await?;
        Ok(())
    }

    async fn touch_activity(&self, group_id: &Uuid, at: DateTime<Utc>) -> Result<bool> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                r#"
                UPDATE study_groups
                SET last_activity = $2
                WHERE id = $1
                "#,
                &[group_id, &at],
            )
            .await?;
        Ok(updated > 0)
    }

    async fn delete(&self, group_id: &Uuid) -> Result<bool> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(
                r#"
                DELETE FROM study_groups
                WHERE id = $1
                "#,
                &[group_id],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM study_groups", &[])
            .await?;
        Ok(deleted)
    }

    async fn expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<StudyGroup>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *
                FROM study_groups
                WHERE is_session_active = true
                  AND cardinality(active_participants) = 0
                  AND last_activity < $1
                "#,
                &[&cutoff],
            )
            .await?;
        Ok(rows.iter().map(StudyGroup::from).collect())
    }

    async fn idle(&self) -> Result<Vec<StudyGroup>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                r#"
                SELECT *
                FROM study_groups
                WHERE is_session_active = false
                   OR cardinality(active_participants) = 0
                "#,
                &[],
            )
            .await?;
        Ok(rows.iter().map(StudyGroup::from).collect())
    }
}
