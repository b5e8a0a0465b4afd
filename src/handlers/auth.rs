use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use tower_cookies::{Cookies, Cookie};
use tower_cookies::cookie::time::Duration;
use uuid::Uuid;
use serde::{Deserialize, Serialize};
use chrono::Utc;

use crate::{
    error::{AppError, Result},
    models::session::Session,
    models::user::User,
    services::auth as auth_service,
    state::AppState,
    validation::auth::*,
};

use redis::AsyncCommands;

/// The request payload for user registration.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub id_number: String,
    pub firstname: String,
    pub lastname: String,
    pub email: Option<String>,
    #[serde(default)]
    pub program: String,
    pub password: String,
}

/// The request payload for user login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub id_number: String,
    pub password: String,
}

/// The request payload for changing a user's password.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// The response payload for authentication-related requests.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
}

/// Creates a secure cookie with the given name, value, and max age.
fn create_secure_cookie(name: String, value: String, max_age_days: i64) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);

    let is_production = std::env::var("APP_ENV")
        .unwrap_or_else(|_| "development".to_string()) == "production";

    cookie.set_http_only(true);

    if is_production {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    let duration_secs = max_age_days * 86400;
    cookie.set_max_age(Duration::seconds(duration_secs));
    cookie.set_path("/");

    cookie
}

/// Stores a fresh session in Redis and attaches the session cookie.
async fn establish_session(
    state: &mut AppState,
    cookies: &Cookies,
    user: &User,
) -> Result<()> {
    let session_id = Uuid::new_v4();
    tracing::debug!("🔑 Generated session_id: {}", session_id);

    let session = Session {
        user_id: user.id,
        id_number: user.id_number.clone(),
        created_at: Utc::now(),
        expires_at: Utc::now() + chrono::Duration::days(state.config.session_duration_days),
    };

    let session_json = sonic_rs::to_string(&session)
        .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;

    let expiration_seconds: u64 = (state.config.session_duration_days * 86400) as u64;
    let _: () = state
        .redis
        .set_ex(
            format!("session:{}", session_id),
            &session_json,
            expiration_seconds,
        )
        .await
        .map_err(|e| {
            tracing::error!("❌ Redis set_ex failed: {}", e);
            AppError::Redis(e)
        })?;

    tracing::info!("✅ Session saved to Redis: session:{}", session_id);

    let session_cookie = create_secure_cookie(
        "session_id".to_string(),
        session_id.to_string(),
        state.config.session_duration_days,
    );
    cookies.add(session_cookie);
    tracing::info!("✅ Session cookie added: session_id={}", session_id);

    Ok(())
}

/// Handles user registration.
#[axum::debug_handler]
pub async fn register(
    State(mut state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("📝 Register attempt for id_number: {}", payload.id_number);
    validate_id_number(&payload.id_number)?;
    validate_name("First name", &payload.firstname)?;
    validate_name("Last name", &payload.lastname)?;
    validate_password(&payload.password)?;

    let user = auth_service::create_user(
        &state.db,
        payload.id_number,
        payload.firstname,
        payload.lastname,
        payload.email,
        payload.program,
        payload.password,
    )
    .await?;

    tracing::info!("✅ User registered: {}", user.id);

    establish_session(&mut state, &cookies, &user).await?;

    let response = AuthResponse {
        success: true,
        message: "Registration successful. Welcome!".to_string(),
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles user login.
#[axum::debug_handler]
pub async fn login(
    State(mut state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt for id_number: {}", payload.id_number);
    validate_id_number(&payload.id_number)?;

    let user = auth_service::authenticate_user(
        &state.db,
        payload.id_number,
        payload.password,
    )
    .await?;

    establish_session(&mut state, &cookies, &user).await?;

    tracing::info!("✅ User logged in: {}", user.id);

    let response = AuthResponse {
        success: true,
        message: "Login successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles user logout.
#[axum::debug_handler]
pub async fn logout(
    State(mut state): State<AppState>,
    Extension(session): Extension<Session>,
    cookies: Cookies,
) -> Result<Response> {
    tracing::info!("👋 Logout for user: {}", session.user_id);

    let session_id = cookies
        .get("session_id")
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Authentication("No session cookie".to_string()))?;

    let _: () = state
        .redis
        .del(format!("session:{}", session_id))
        .await?;

    tracing::info!("✅ Session deleted from Redis");

    let mut session_cookie = Cookie::new("session_id", "");
    session_cookie.set_max_age(Duration::seconds(0));
    session_cookie.set_path("/");
    cookies.remove(session_cookie);

    tracing::info!("✅ User logged out: {}", session.user_id);

    let response = AuthResponse {
        success: true,
        message: "Logout successful".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Handles changing a user's password.
#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response> {
    tracing::info!("🔑 Change password for user: {}", session.user_id);

    validate_password(&payload.new_password)?;

    auth_service::change_password(
        &state.db,
        session.user_id,
        payload.old_password,
        payload.new_password,
    )
    .await?;

    tracing::info!("✅ Password changed for user: {}", session.user_id);

    let response = AuthResponse {
        success: true,
        message: "Password changed successfully".to_string(),
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}
