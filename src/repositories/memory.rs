use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::Result,
    models::study_group::StudyGroup,
    repositories::study_group::StudyGroupRepository,
};

/// An in-memory `StudyGroupRepository` for tests.
///
/// Mirrors the guarded-update semantics of the Postgres implementation:
/// member/participant inserts are set-adds, removals of absent entries are
/// no-ops, and every mutation touches exactly one group.
#[derive(Default)]
pub struct InMemoryStudyGroupRepository {
    groups: Mutex<HashMap<Uuid, StudyGroup>>,
}

impl InMemoryStudyGroupRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites a group's `last_activity`, simulating elapsed wall-clock
    /// time for inactivity-cutoff tests.
    pub fn backdate_activity(&self, group_id: &Uuid, at: DateTime<Utc>) {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            group.last_activity = at;
        }
    }
}

#[async_trait]
impl StudyGroupRepository for InMemoryStudyGroupRepository {
    async fn insert(&self, group: &StudyGroup) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn find(&self, group_id: &Uuid) -> Result<Option<StudyGroup>> {
        let groups = self.groups.lock().expect("repository lock poisoned");
        Ok(groups.get(group_id).cloned())
    }

    async fn all(&self) -> Result<Vec<StudyGroup>> {
        let groups = self.groups.lock().expect("repository lock poisoned");
        let mut all: Vec<StudyGroup> = groups.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn active(&self) -> Result<Vec<StudyGroup>> {
        let groups = self.groups.lock().expect("repository lock poisoned");
        Ok(groups
            .values()
            .filter(|g| g.is_session_active)
            .cloned()
            .collect())
    }

    async fn for_member(&self, user_id: &str) -> Result<Vec<StudyGroup>> {
        let groups = self.groups.lock().expect("repository lock poisoned");
        Ok(groups
            .values()
            .filter(|g| g.members.iter().any(|m| m == user_id))
            .cloned()
            .collect())
    }

    async fn add_member(&self, group_id: &Uuid, user_id: &str) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            if !group.members.iter().any(|m| m == user_id) {
                group.members.push(user_id.to_string());
            }
        }
        Ok(())
    }

    async fn remove_member(&self, group_id: &Uuid, user_id: &str) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            group.members.retain(|m| m != user_id);
        }
        Ok(())
    }

    async fn add_participant(&self, group_id: &Uuid, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            if !group.active_participants.iter().any(|p| p == user_id) {
                group.active_participants.push(user_id.to_string());
                group.last_activity = at;
            }
        }
        Ok(())
    }

    async fn remove_participant(&self, group_id: &Uuid, user_id: &str) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            group.active_participants.retain(|p| p != user_id);
        }
        Ok(())
    }

    async fn begin_session(&self, group_id: &Uuid, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            group.is_session_active = true;
            group.session_started_at = Some(at);
            group.last_activity = at;
            group.active_participants = vec![user_id.to_string()];
        }
        Ok(())
    }

    async fn end_session(&self, group_id: &Uuid) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            group.is_session_active = false;
            group.session_started_at = None;
            group.active_participants.clear();
        }
        Ok(())
    }

    async fn clear_participants(&self, group_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        if let Some(group) = groups.get_mut(group_id) {
            group.active_participants.clear();
            group.last_activity = at;
        }
        Ok(())
    }

    async fn touch_activity(&self, group_id: &Uuid, at: DateTime<Utc>) -> Result<bool> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        match groups.get_mut(group_id) {
            Some(group) => {
                group.last_activity = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, group_id: &Uuid) -> Result<bool> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        Ok(groups.remove(group_id).is_some())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut groups = self.groups.lock().expect("repository lock poisoned");
        let count = groups.len() as u64;
        groups.clear();
        Ok(count)
    }

    async fn expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<StudyGroup>> {
        let groups = self.groups.lock().expect("repository lock poisoned");
        Ok(groups
            .values()
            .filter(|g| g.is_reapable(cutoff))
            .cloned()
            .collect())
    }

    async fn idle(&self) -> Result<Vec<StudyGroup>> {
        let groups = self.groups.lock().expect("repository lock poisoned");
        Ok(groups
            .values()
            .filter(|g| !g.is_session_active || g.active_participants.is_empty())
            .cloned()
            .collect())
    }
}
