use std::env;
use anyhow::{Context, Result};

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// The address the HTTP server binds to.
    pub bind_addr: String,
    /// The duration of an auth session in days.
    pub session_duration_days: i64,
    /// Minutes an empty live session may idle before the sweep deletes it.
    pub inactivity_threshold_minutes: i64,
    /// How often the background reaper runs, in seconds.
    pub reaper_interval_secs: u64,
    /// Default member capacity recorded on new study groups.
    pub default_max_members: i32,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            session_duration_days: env::var("SESSION_DURATION_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("Invalid SESSION_DURATION_DAYS")?,
            inactivity_threshold_minutes: env::var("INACTIVITY_THRESHOLD_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid INACTIVITY_THRESHOLD_MINUTES")?,
            reaper_interval_secs: env::var("REAPER_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid REAPER_INTERVAL_SECS")?,
            default_max_members: env::var("DEFAULT_MAX_MEMBERS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid DEFAULT_MAX_MEMBERS")?,
        })
    }
}
