use axum::{
    Router,
    routing::{get, post, delete},
    middleware::from_fn_with_state,
};

use anyhow::Context;
use http::{Method, header};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::{
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
    cors::CorsLayer,
};

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod state;
mod db;
mod notify;
mod reaper;

mod models {
    pub mod user;
    pub mod session;
    pub mod study_group;
}

mod repositories {
    pub mod study_group;
    pub mod user;
    #[cfg(test)]
    pub mod memory;
}

mod services {
    pub mod auth;
    pub mod study_groups;
}

mod handlers {
    pub mod auth;
    pub mod events;
    pub mod study_groups;
}

mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

mod validation {
    pub mod auth;
    pub mod study_groups;
}

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).await?;
    tracing::info!("✅ AppState initialized");

    let cors = CorsLayer::new()
        .allow_origin([
            "http://localhost:5173".parse().unwrap(),
            "http://127.0.0.1:5173".parse().unwrap(),
            "http://localhost:3000".parse().unwrap(),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400));

    let session_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10_000)
            .burst_size(50_000)
            .use_headers()
            .finish()
            .unwrap(),
    );

    let register_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_register,
        ))
        .with_state(state.clone());

    let login_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::rate_limit::rate_limit_login,
        ))
        .with_state(state.clone());

    let account_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/auth/change-password",
            post(handlers::auth::change_password),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    let group_routes = Router::new()
        .route("/api/study-groups", get(handlers::study_groups::list_groups))
        .route(
            "/api/study-groups/active",
            get(handlers::study_groups::list_active_sessions),
        )
        .route(
            "/api/study-groups/status",
            get(handlers::study_groups::groups_status),
        )
        .route(
            "/api/study-groups/events",
            get(handlers::events::participant_events),
        )
        .route(
            "/api/study-groups/member/{user_id}",
            get(handlers::study_groups::list_member_groups),
        )
        .route(
            "/api/study-groups/{group_id}/session-info",
            get(handlers::study_groups::session_info),
        )
        .route("/api/study-groups", post(handlers::study_groups::create_group))
        .route(
            "/api/study-groups/{group_id}/join",
            post(handlers::study_groups::join_group),
        )
        .route(
            "/api/study-groups/{group_id}/leave",
            delete(handlers::study_groups::leave_group),
        )
        .route(
            "/api/study-groups/{group_id}/start-session",
            post(handlers::study_groups::start_session),
        )
        .route(
            "/api/study-groups/{group_id}/end-session",
            post(handlers::study_groups::end_session),
        )
        .route(
            "/api/study-groups/{group_id}/verify-password",
            post(handlers::study_groups::verify_password),
        )
        .route(
            "/api/study-groups/{group_id}/join-session",
            post(handlers::study_groups::join_session),
        )
        .route(
            "/api/study-groups/{group_id}/leave-session",
            post(handlers::study_groups::leave_session),
        )
        .route(
            "/api/study-groups/cleanup-inactive",
            post(handlers::study_groups::cleanup_inactive),
        )
        .route(
            "/api/study-groups/update-activity",
            post(handlers::study_groups::update_activity),
        )
        .layer(tower_governor::GovernorLayer::new(
            session_governor_conf.clone(),
        ))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route(
            "/api/study-groups/delete-all",
            delete(handlers::study_groups::delete_all),
        )
        .route(
            "/api/study-groups/cleanup-all-idle",
            post(handlers::study_groups::cleanup_all_idle),
        )
        .route(
            "/api/study-groups/{group_id}/force-cleanup",
            post(handlers::study_groups::force_cleanup),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_auth,
        ))
        .with_state(state.clone());

    let app = Router::new()
        .merge(register_routes)
        .merge(login_routes)
        .merge(account_routes)
        .merge(group_routes)
        .merge(admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true))
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let reaper_handle = reaper::spawn(state.clone(), shutdown_rx);
    tracing::info!(
        "✅ Inactivity reaper started (every {}s, threshold {}min)",
        state.config.reaper_interval_secs,
        state.config.inactivity_threshold_minutes
    );

    let addr: SocketAddr = state
        .config
        .bind_addr
        .parse()
        .context("Invalid BIND_ADDR")?;
    tracing::info!("🚀 Server listening on http://{}", addr);
    tracing::info!("✅ All systems operational");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown_tx.send(true).ok();
    let _ = reaper_handle.await;
    tracing::info!("👋 Shutdown complete");

    Ok(())
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
