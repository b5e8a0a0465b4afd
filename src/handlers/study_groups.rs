use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::study_group::StudyGroup,
    repositories::user as user_repo,
    services::study_groups as group_service,
    state::AppState,
    validation::study_groups::*,
};

/// The request payload for creating a study group.
#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub creator_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub password: String,
    pub max_members: Option<i32>,
}

/// The request payload for membership and session operations.
#[derive(Deserialize)]
pub struct MemberRequest {
    #[serde(default)]
    pub user_id: String,
}

/// The request payload for ending a session.
#[derive(Deserialize)]
pub struct EndSessionRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_delete_group")]
    pub delete_group: bool,
}

fn default_delete_group() -> bool {
    true
}

/// The request payload for verifying a group password.
#[derive(Deserialize)]
pub struct VerifyPasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// The request payload for an explicit activity ping.
#[derive(Deserialize)]
pub struct UpdateActivityRequest {
    pub group_id: Uuid,
}

/// The query parameters for the inactivity cleanup sweep.
#[derive(Deserialize)]
pub struct CleanupQuery {
    #[serde(default)]
    pub threshold_minutes: Option<i64>,
}

/// Serializes a group for API responses. The shared session password is
/// never echoed back.
fn group_json(group: &StudyGroup) -> sonic_rs::Value {
    sonic_rs::json!({
        "id": group.id.to_string(),
        "title": group.title,
        "subject": group.subject,
        "schedule": group.schedule,
        "creator_id": group.creator_id,
        "members": group.members,
        "max_members": group.max_members,
        "has_password": group.has_password(),
        "is_session_active": group.is_session_active,
        "session_started_at": group.session_started_at.map(|t| t.to_rfc3339()),
        "active_participants": group.active_participants,
        "participant_count": group.participant_count(),
        "last_activity": group.last_activity.to_rfc3339(),
        "auto_delete_minutes": group.auto_delete_minutes,
        "created_at": group.created_at.to_rfc3339()
    })
}

/// Lists all study groups.
#[axum::debug_handler]
pub async fn list_groups(State(state): State<AppState>) -> Result<Response> {
    let groups = state.groups.all().await?;
    let groups_json: Vec<_> = groups.iter().map(group_json).collect();

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "groups": groups_json
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Lists only groups with a live session.
#[axum::debug_handler]
pub async fn list_active_sessions(State(state): State<AppState>) -> Result<Response> {
    let groups = state.groups.active().await?;
    let groups_json: Vec<_> = groups.iter().map(group_json).collect();

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "groups": groups_json
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Lists the groups a user is a member of.
#[axum::debug_handler]
pub async fn list_member_groups(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    validate_user_id(&user_id)?;

    let groups = state.groups.for_member(&user_id).await?;
    let groups_json: Vec<_> = groups.iter().map(group_json).collect();

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "groups": groups_json
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Creates a study group that starts immediately as a live session.
#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Response> {
    validate_user_id(&req.creator_id)?;
    validate_title(&req.title)?;
    validate_descriptive_field("Subject", &req.subject)?;
    validate_descriptive_field("Schedule", &req.schedule)?;
    validate_group_password(&req.password)?;

    let group = group_service::create_group(
        state.groups.as_ref(),
        group_service::NewGroup {
            creator_id: req.creator_id,
            title: req.title,
            subject: req.subject,
            schedule: req.schedule,
            password: req.password,
            max_members: req.max_members,
        },
        state.config.default_max_members,
        state.config.inactivity_threshold_minutes,
    )
    .await?;

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "group": group_json(&group),
        "message": "Study group created successfully"
    }))
    .unwrap_or_default();

    Ok((StatusCode::CREATED, response).into_response())
}

/// Joins a study group (membership, not the live session).
#[axum::debug_handler]
pub async fn join_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<MemberRequest>,
) -> Result<Response> {
    validate_user_id(&req.user_id)?;

    let joined = group_service::join_group(state.groups.as_ref(), &group_id, &req.user_id).await?;

    let message = if joined {
        "Successfully joined the study group"
    } else {
        "Already a member of this group"
    };

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "message": message
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Leaves a study group (membership).
#[axum::debug_handler]
pub async fn leave_group(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<MemberRequest>,
) -> Result<Response> {
    validate_user_id(&req.user_id)?;

    group_service::leave_group(state.groups.as_ref(), &group_id, &req.user_id).await?;

    Ok((
        StatusCode::OK,
        r#"{"success":true,"message":"Successfully left the study group"}"#,
    )
        .into_response())
}

/// Gets current session information, with member display decoration from
/// the user directory.
#[axum::debug_handler]
pub async fn session_info(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<Response> {
    let group = state
        .groups
        .find(&group_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut members_info = Vec::new();
    for member_id in &group.members {
        if let Some((name, program)) = user_repo::display_info(&state.db, member_id).await? {
            members_info.push(sonic_rs::json!({
                "id_number": member_id,
                "name": name,
                "program": program
            }));
        }
    }

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "group": group_json(&group),
        "members": members_info,
        "events_url": "/api/study-groups/events"
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Starts (or restarts) a live study session.
#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<MemberRequest>,
) -> Result<Response> {
    validate_user_id(&req.user_id)?;

    group_service::start_session(state.groups.as_ref(), &group_id, &req.user_id).await?;

    Ok((
        StatusCode::OK,
        r#"{"success":true,"message":"Study session started successfully"}"#,
    )
        .into_response())
}

/// Ends a live study session, deleting the group by default.
#[axum::debug_handler]
pub async fn end_session(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Response> {
    validate_user_id(&req.user_id)?;

    let deleted =
        group_service::end_session(state.groups.as_ref(), &group_id, req.delete_group).await?;

    let message = if deleted {
        "Study session ended and group deleted"
    } else {
        "Study session ended"
    };

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "message": message,
        "group_deleted": deleted
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Verifies the password for joining a live session.
#[axum::debug_handler]
pub async fn verify_password(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<VerifyPasswordRequest>,
) -> Result<Response> {
    validate_group_password(&req.password)?;

    let group =
        group_service::verify_password(state.groups.as_ref(), &group_id, &req.password).await?;

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "message": "Password verified successfully",
        "group": {
            "id": group.id.to_string(),
            "title": group.title,
            "subject": group.subject,
            "creator_id": group.creator_id,
            "active_participants": group.participant_count()
        }
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Joins an active study session.
#[axum::debug_handler]
pub async fn join_session(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<MemberRequest>,
) -> Result<Response> {
    validate_user_id(&req.user_id)?;

    let presence = group_service::join_session(
        state.groups.as_ref(),
        &state.notifier,
        &group_id,
        &req.user_id,
    )
    .await?;

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "message": "Successfully joined the study session",
        "participant_count": presence.participant_count,
        "participants": presence.participants
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Leaves an active study session. Draining the room starts the inactivity
/// countdown instead of deleting the group.
#[axum::debug_handler]
pub async fn leave_session(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<MemberRequest>,
) -> Result<Response> {
    validate_user_id(&req.user_id)?;

    let presence = group_service::leave_session(
        state.groups.as_ref(),
        &state.notifier,
        &group_id,
        &req.user_id,
    )
    .await?;

    let message = if presence.participant_count == 0 {
        "Left session but keeping it active for others to join"
    } else {
        "Successfully left the study session"
    };

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "message": message,
        "group_deleted": presence.group_deleted,
        "participant_count": presence.participant_count,
        "participants": presence.participants
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Force cleanup of participants - remove all and reset to empty.
#[axum::debug_handler]
pub async fn force_cleanup(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> Result<Response> {
    let previous =
        group_service::force_cleanup(state.groups.as_ref(), &state.notifier, &group_id).await?;

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "message": "Participants list force-cleaned",
        "previous_count": previous.len(),
        "previous_participants": previous,
        "new_count": 0
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Deletes groups whose empty live session idled past the threshold.
#[axum::debug_handler]
pub async fn cleanup_inactive(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Response> {
    let minutes = query
        .threshold_minutes
        .unwrap_or(state.config.inactivity_threshold_minutes);
    let deleted =
        group_service::cleanup_inactive(state.groups.as_ref(), Duration::minutes(minutes)).await?;

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "deleted_count": deleted,
        "message": format!("Cleaned up {} inactive groups", deleted)
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Deletes every group that is inactive or has no active participants.
#[axum::debug_handler]
pub async fn cleanup_all_idle(State(state): State<AppState>) -> Result<Response> {
    let removed = group_service::cleanup_all_idle(state.groups.as_ref()).await?;

    let deleted_groups: Vec<_> = removed
        .iter()
        .map(|g| {
            sonic_rs::json!({
                "id": g.id.to_string(),
                "title": g.title,
                "subject": g.subject,
                "creator_id": g.creator_id,
                "is_session_active": g.is_session_active,
                "active_participants_count": g.participant_count()
            })
        })
        .collect();

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "deleted_count": deleted_groups.len(),
        "deleted_groups": deleted_groups,
        "message": format!("Cleaned up {} idle groups", deleted_groups.len())
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Updates a group's last-activity timestamp.
#[axum::debug_handler]
pub async fn update_activity(
    State(state): State<AppState>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<Response> {
    group_service::touch_activity(state.groups.as_ref(), &req.group_id).await?;

    Ok((
        StatusCode::OK,
        r#"{"success":true,"message":"Activity updated successfully"}"#,
    )
        .into_response())
}

/// Deletes all study groups.
#[axum::debug_handler]
pub async fn delete_all(State(state): State<AppState>) -> Result<Response> {
    let deleted = state.groups.delete_all().await?;
    tracing::warn!("⚠️ All study groups deleted ({} removed)", deleted);

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "deleted_count": deleted,
        "message": format!("Successfully deleted all {} study groups", deleted)
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}

/// Per-group countdown diagnostics against the configured threshold.
#[axum::debug_handler]
pub async fn groups_status(State(state): State<AppState>) -> Result<Response> {
    let now = Utc::now();
    let cutoff = now - Duration::minutes(state.config.inactivity_threshold_minutes);
    let groups = state.groups.all().await?;

    let mut active_groups = 0usize;
    let mut empty_groups = 0usize;
    let mut groups_for_deletion = 0usize;
    let mut details = Vec::with_capacity(groups.len());

    for group in &groups {
        let will_be_deleted = group.is_reapable(cutoff);

        if group.is_session_active {
            active_groups += 1;
        }
        if group.active_participants.is_empty() {
            empty_groups += 1;
        }
        if will_be_deleted {
            groups_for_deletion += 1;
        }

        details.push(sonic_rs::json!({
            "id": group.id.to_string(),
            "title": group.title,
            "is_session_active": group.is_session_active,
            "participant_count": group.participant_count(),
            "participants": group.active_participants,
            "last_activity": group.last_activity.to_rfc3339(),
            "minutes_since_activity": group.minutes_since_activity(now),
            "will_be_auto_deleted": will_be_deleted
        }));
    }

    let response = sonic_rs::to_string(&sonic_rs::json!({
        "success": true,
        "status": {
            "total_groups": groups.len(),
            "active_groups": active_groups,
            "empty_groups": empty_groups,
            "groups_for_deletion": groups_for_deletion,
            "groups_details": details
        },
        "cutoff_time": cutoff.to_rfc3339(),
        "current_time": now.to_rfc3339()
    }))
    .unwrap_or_default();

    Ok((StatusCode::OK, response).into_response())
}
