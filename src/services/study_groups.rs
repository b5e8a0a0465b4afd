use chrono::{Duration, Utc};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::study_group::StudyGroup,
    notify::ParticipantNotifier,
    repositories::study_group::StudyGroupRepository,
};

/// Parameters for creating a study group.
pub struct NewGroup {
    pub creator_id: String,
    pub title: String,
    pub subject: String,
    pub schedule: String,
    pub password: String,
    pub max_members: Option<i32>,
}

/// The participant set after a session join or leave.
#[derive(Debug)]
pub struct SessionPresence {
    pub participant_count: usize,
    pub participants: Vec<String>,
    pub group_deleted: bool,
}

/// Creates a study group that immediately starts as a live session:
/// the creator is the sole member and the sole active participant.
pub async fn create_group(
    repo: &dyn StudyGroupRepository,
    new: NewGroup,
    default_max_members: i32,
    auto_delete_minutes: i64,
) -> Result<StudyGroup> {
    if new.creator_id.trim().is_empty() {
        return Err(AppError::Validation("Creator ID is required".to_string()));
    }

    let now = Utc::now();
    let group = StudyGroup {
        id: Uuid::new_v4(),
        title: new.title,
        subject: new.subject,
        schedule: new.schedule,
        password: new.password,
        creator_id: new.creator_id.clone(),
        members: vec![new.creator_id.clone()],
        max_members: new.max_members.unwrap_or(default_max_members),
        is_session_active: true,
        session_started_at: Some(now),
        active_participants: vec![new.creator_id],
        last_activity: now,
        auto_delete_minutes,
        created_at: now,
    };

    repo.insert(&group).await?;
    tracing::info!("✅ Study group created: {} ({})", group.title, group.id);

    Ok(group)
}

/// Adds a user to the group's membership. Returns false when the user was
/// already a member (idempotent).
pub async fn join_group(
    repo: &dyn StudyGroupRepository,
    group_id: &Uuid,
    user_id: &str,
) -> Result<bool> {
    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    if group.members.iter().any(|m| m == user_id) {
        return Ok(false);
    }

    repo.add_member(group_id, user_id).await?;
    Ok(true)
}

/// Removes a user from the group's membership. Removing a non-member is a
/// no-op. The creator stays a member for the group's lifetime.
pub async fn leave_group(
    repo: &dyn StudyGroupRepository,
    group_id: &Uuid,
    user_id: &str,
) -> Result<()> {
    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    if group.creator_id == user_id {
        return Err(AppError::Forbidden(
            "The creator cannot leave their own group".to_string(),
        ));
    }

    repo.remove_member(group_id, user_id).await
}

/// Joins the group's live session. Set semantics: a user already present is
/// not added twice and does not refresh the countdown.
pub async fn join_session(
    repo: &dyn StudyGroupRepository,
    notifier: &ParticipantNotifier,
    group_id: &Uuid,
    user_id: &str,
) -> Result<SessionPresence> {
    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    if !group.is_session_active {
        return Err(AppError::InvalidState(
            "No active session to join".to_string(),
        ));
    }

    if !group.active_participants.iter().any(|p| p == user_id) {
        repo.add_participant(group_id, user_id, Utc::now()).await?;
        tracing::debug!("User {} joined session in group {}", user_id, group_id);
    } else {
        tracing::debug!(
            "User {} already in session for group {}",
            user_id,
            group_id
        );
    }

    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;
    notifier.participant_change(group.id, &group.active_participants);

    Ok(SessionPresence {
        participant_count: group.participant_count(),
        participants: group.active_participants,
        group_deleted: false,
    })
}

/// Leaves the group's live session.
///
/// Draining the last participant does NOT delete the group: the session
/// stays active with an empty participant set and `last_activity` is
/// refreshed, starting the inactivity countdown the cleanup sweep acts on.
pub async fn leave_session(
    repo: &dyn StudyGroupRepository,
    notifier: &ParticipantNotifier,
    group_id: &Uuid,
    user_id: &str,
) -> Result<SessionPresence> {
    repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    repo.remove_participant(group_id, user_id).await?;

    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    if group.active_participants.is_empty() {
        tracing::debug!(
            "🕒 Group {} drained, inactivity countdown started",
            group_id
        );
        repo.clear_participants(group_id, Utc::now()).await?;
        notifier.participant_change(group.id, &[]);

        return Ok(SessionPresence {
            participant_count: 0,
            participants: Vec::new(),
            group_deleted: false,
        });
    }

    notifier.participant_change(group.id, &group.active_participants);

    Ok(SessionPresence {
        participant_count: group.participant_count(),
        participants: group.active_participants,
        group_deleted: false,
    })
}

/// Starts (or restarts) the group's live session. Only members may start a
/// session; any previous participant set is dropped in favor of the
/// starter alone.
pub async fn start_session(
    repo: &dyn StudyGroupRepository,
    group_id: &Uuid,
    user_id: &str,
) -> Result<()> {
    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    if !group.members.iter().any(|m| m == user_id) {
        return Err(AppError::Forbidden(
            "You must be a member to start a session".to_string(),
        ));
    }

    repo.begin_session(group_id, user_id, Utc::now()).await
}

/// Ends the group's live session. With `delete_group` the group document is
/// removed entirely (terminal); otherwise the session is marked inactive
/// and the participant set emptied. Returns whether the group was deleted.
pub async fn end_session(
    repo: &dyn StudyGroupRepository,
    group_id: &Uuid,
    delete_group: bool,
) -> Result<bool> {
    repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    if delete_group {
        repo.delete(group_id).await?;
        tracing::info!("Study group {} deleted on session end", group_id);
        return Ok(true);
    }

    repo.end_session(group_id).await?;
    Ok(false)
}

/// Verifies the shared secret gating session join. An empty stored password
/// means the group is open and no check is performed. Comparison is
/// constant-time.
pub async fn verify_password(
    repo: &dyn StudyGroupRepository,
    group_id: &Uuid,
    supplied: &str,
) -> Result<StudyGroup> {
    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;

    if !group.is_session_active {
        return Err(AppError::InvalidState(
            "Study session is not active".to_string(),
        ));
    }

    if group.has_password() {
        let matches: bool = group
            .password
            .as_bytes()
            .ct_eq(supplied.as_bytes())
            .into();
        if !matches {
            return Err(AppError::Forbidden("Incorrect password".to_string()));
        }
    }

    Ok(group)
}

/// Deletes every group whose live session has been empty for longer than
/// `threshold`. Emptiness is re-checked per group before each delete; the
/// scan racing a concurrent join is accepted.
pub async fn cleanup_inactive(
    repo: &dyn StudyGroupRepository,
    threshold: Duration,
) -> Result<u64> {
    let cutoff = Utc::now() - threshold;
    let expired = repo.expired(cutoff).await?;

    let mut deleted = 0u64;
    for group in expired {
        if !group.active_participants.is_empty() {
            continue;
        }
        if repo.delete(&group.id).await? {
            deleted += 1;
            tracing::info!(
                "Auto-deleted inactive group: {} ({})",
                group.title,
                group.id
            );
        }
    }

    Ok(deleted)
}

/// Administrative sweep: deletes every group that is inactive or has no
/// active participants, regardless of how recently it was touched.
/// Returns the deleted groups for reporting.
pub async fn cleanup_all_idle(repo: &dyn StudyGroupRepository) -> Result<Vec<StudyGroup>> {
    let idle = repo.idle().await?;

    let mut removed = Vec::new();
    for group in idle {
        if group.active_participants.is_empty() || !group.is_session_active {
            if repo.delete(&group.id).await? {
                tracing::info!("Deleted idle group: {} ({})", group.title, group.id);
                removed.push(group);
            }
        }
    }

    Ok(removed)
}

/// Administrative override: unconditionally empties the participant set and
/// restarts the countdown. Returns the previous participants.
pub async fn force_cleanup(
    repo: &dyn StudyGroupRepository,
    notifier: &ParticipantNotifier,
    group_id: &Uuid,
) -> Result<Vec<String>> {
    let group = repo.find(group_id).await?.ok_or(AppError::NotFound)?;
    let previous = group.active_participants.clone();

    repo.clear_participants(group_id, Utc::now()).await?;
    notifier.participant_change(group.id, &[]);

    Ok(previous)
}

/// Explicit activity ping, refreshing the inactivity countdown.
pub async fn touch_activity(repo: &dyn StudyGroupRepository, group_id: &Uuid) -> Result<()> {
    if !repo.touch_activity(group_id, Utc::now()).await? {
        return Err(AppError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::memory::InMemoryStudyGroupRepository;

    fn notifier() -> ParticipantNotifier {
        ParticipantNotifier::new(16)
    }

    fn new_group(creator: &str, password: &str) -> NewGroup {
        NewGroup {
            creator_id: creator.to_string(),
            title: "NLE Review".to_string(),
            subject: "Pharmacology".to_string(),
            schedule: "MWF 19:00".to_string(),
            password: password.to_string(),
            max_members: None,
        }
    }

    async fn create(repo: &InMemoryStudyGroupRepository, creator: &str) -> StudyGroup {
        create_group(repo, new_group(creator, ""), 10, 10)
            .await
            .expect("create_group")
    }

    #[tokio::test]
    async fn create_starts_live_session_with_creator() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;

        assert!(group.members.contains(&"U1".to_string()));
        assert_eq!(group.active_participants, vec!["U1".to_string()]);
        assert!(group.is_session_active);
        assert!(group.session_started_at.is_some());
    }

    #[tokio::test]
    async fn create_requires_creator_id() {
        let repo = InMemoryStudyGroupRepository::new();
        let err = create_group(&repo, new_group("  ", ""), 10, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn join_group_is_idempotent() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;

        assert!(join_group(&repo, &group.id, "U2").await.unwrap());
        assert!(!join_group(&repo, &group.id, "U2").await.unwrap());

        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert_eq!(group.members, vec!["U1".to_string(), "U2".to_string()]);
    }

    #[tokio::test]
    async fn creator_stays_a_member() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;
        join_group(&repo, &group.id, "U2").await.unwrap();

        let err = leave_group(&repo, &group.id, "U1").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        leave_group(&repo, &group.id, "U2").await.unwrap();
        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert_eq!(group.members, vec!["U1".to_string()]);
    }

    #[tokio::test]
    async fn join_unknown_group_is_not_found() {
        let repo = InMemoryStudyGroupRepository::new();
        let err = join_group(&repo, &Uuid::new_v4(), "U1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn join_session_rejects_inactive_session() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;
        end_session(&repo, &group.id, false).await.unwrap();

        let err = join_session(&repo, &notifier(), &group.id, "U1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn single_participant_round_trip_keeps_session_active() {
        let repo = InMemoryStudyGroupRepository::new();
        let n = notifier();
        let group = create(&repo, "U1").await;

        // The creator is already present; leaving drains the room.
        let left = leave_session(&repo, &n, &group.id, "U1").await.unwrap();
        assert_eq!(left.participant_count, 0);
        assert!(!left.group_deleted);

        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert!(group.is_session_active);
        assert!(group.active_participants.is_empty());

        // Joining again cancels the countdown.
        let joined = join_session(&repo, &n, &group.id, "U1").await.unwrap();
        assert_eq!(joined.participants, vec!["U1".to_string()]);
    }

    #[tokio::test]
    async fn start_session_resets_participants_to_starter() {
        let repo = InMemoryStudyGroupRepository::new();
        let n = notifier();
        let group = create(&repo, "U1").await;
        join_group(&repo, &group.id, "U2").await.unwrap();
        join_session(&repo, &n, &group.id, "U2").await.unwrap();

        start_session(&repo, &group.id, "U2").await.unwrap();

        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert_eq!(group.active_participants, vec!["U2".to_string()]);
        assert!(group.is_session_active);
    }

    #[tokio::test]
    async fn start_session_requires_membership() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;

        let err = start_session(&repo, &group.id, "intruder").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn end_session_with_delete_is_terminal() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;

        assert!(end_session(&repo, &group.id, true).await.unwrap());
        assert!(repo.find(&group.id).await.unwrap().is_none());

        let err = join_session(&repo, &notifier(), &group.id, "U1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn end_session_keep_clears_session_state() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;

        assert!(!end_session(&repo, &group.id, false).await.unwrap());

        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert!(!group.is_session_active);
        assert!(group.session_started_at.is_none());
        assert!(group.active_participants.is_empty());

        // startSession transitions back to ACTIVE with the starter alone.
        start_session(&repo, &group.id, "U1").await.unwrap();
        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert!(group.is_session_active);
        assert_eq!(group.active_participants, vec!["U1".to_string()]);
    }

    #[tokio::test]
    async fn verify_password_gates_protected_groups() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create_group(&repo, new_group("U1", "secret"), 10, 10)
            .await
            .unwrap();

        let err = verify_password(&repo, &group.id, "wrong").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let ok = verify_password(&repo, &group.id, "secret").await.unwrap();
        assert_eq!(ok.id, group.id);
    }

    #[tokio::test]
    async fn verify_password_skips_check_for_open_groups() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;

        let ok = verify_password(&repo, &group.id, "anything").await.unwrap();
        assert_eq!(ok.id, group.id);
    }

    #[tokio::test]
    async fn cleanup_skips_groups_within_threshold_or_with_participants() {
        let repo = InMemoryStudyGroupRepository::new();
        let n = notifier();

        // Drained group, countdown just started.
        let drained = create(&repo, "U1").await;
        leave_session(&repo, &n, &drained.id, "U1").await.unwrap();

        // Occupied group, long idle timestamps are irrelevant while someone
        // is present.
        let occupied = create(&repo, "U2").await;
        repo.backdate_activity(&occupied.id, Utc::now() - Duration::minutes(60));

        let deleted = cleanup_inactive(&repo, Duration::minutes(10)).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(repo.find(&drained.id).await.unwrap().is_some());
        assert!(repo.find(&occupied.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_deletes_past_threshold() {
        let repo = InMemoryStudyGroupRepository::new();
        let n = notifier();
        let group = create(&repo, "U1").await;
        leave_session(&repo, &n, &group.id, "U1").await.unwrap();

        repo.backdate_activity(&group.id, Utc::now() - Duration::minutes(11));

        let deleted = cleanup_inactive(&repo, Duration::minutes(10)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.find(&group.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn force_cleanup_reports_previous_participants() {
        let repo = InMemoryStudyGroupRepository::new();
        let n = notifier();
        let group = create(&repo, "U1").await;
        join_group(&repo, &group.id, "U2").await.unwrap();
        join_session(&repo, &n, &group.id, "U2").await.unwrap();

        let previous = force_cleanup(&repo, &n, &group.id).await.unwrap();
        assert_eq!(previous, vec!["U1".to_string(), "U2".to_string()]);

        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert!(group.active_participants.is_empty());
    }

    #[tokio::test]
    async fn touch_activity_refreshes_countdown() {
        let repo = InMemoryStudyGroupRepository::new();
        let group = create(&repo, "U1").await;
        repo.backdate_activity(&group.id, Utc::now() - Duration::minutes(30));

        touch_activity(&repo, &group.id).await.unwrap();

        let group = repo.find(&group.id).await.unwrap().unwrap();
        assert!(group.minutes_since_activity(Utc::now()) < 1);

        let err = touch_activity(&repo, &Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn cleanup_all_idle_removes_empty_and_inactive_groups() {
        let repo = InMemoryStudyGroupRepository::new();
        let n = notifier();

        let drained = create(&repo, "U1").await;
        leave_session(&repo, &n, &drained.id, "U1").await.unwrap();

        let ended = create(&repo, "U2").await;
        end_session(&repo, &ended.id, false).await.unwrap();

        let occupied = create(&repo, "U3").await;

        let removed = cleanup_all_idle(&repo).await.unwrap();
        assert_eq!(removed.len(), 2);
        assert!(repo.find(&occupied.id).await.unwrap().is_some());
    }

    /// Full drain-and-reap walkthrough: two users share a session, both
    /// leave, the countdown runs, the sweep fires only after the threshold.
    #[tokio::test]
    async fn drain_then_reap_scenario() {
        let repo = InMemoryStudyGroupRepository::new();
        let n = notifier();

        let group = create(&repo, "U1").await;
        assert_eq!(group.active_participants, vec!["U1".to_string()]);

        join_group(&repo, &group.id, "U2").await.unwrap();
        let joined = join_session(&repo, &n, &group.id, "U2").await.unwrap();
        assert_eq!(joined.participant_count, 2);
        assert_eq!(
            joined.participants,
            vec!["U1".to_string(), "U2".to_string()]
        );

        let left = leave_session(&repo, &n, &group.id, "U1").await.unwrap();
        assert_eq!(left.participant_count, 1);
        assert_eq!(left.participants, vec!["U2".to_string()]);
        assert!(!left.group_deleted);

        let left = leave_session(&repo, &n, &group.id, "U2").await.unwrap();
        assert_eq!(left.participant_count, 0);
        assert!(!left.group_deleted);

        let current = repo.find(&group.id).await.unwrap().unwrap();
        assert!(current.is_session_active);

        // Threshold not elapsed yet.
        let deleted = cleanup_inactive(&repo, Duration::minutes(10)).await.unwrap();
        assert_eq!(deleted, 0);
        assert!(repo.find(&group.id).await.unwrap().is_some());

        // Simulated clock advance past the threshold.
        repo.backdate_activity(&group.id, Utc::now() - Duration::minutes(11));
        let deleted = cleanup_inactive(&repo, Duration::minutes(10)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.find(&group.id).await.unwrap().is_none());
    }
}
