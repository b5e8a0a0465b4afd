use deadpool_postgres::Pool;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use crate::config::Config;
use crate::error::Result;
use crate::notify::ParticipantNotifier;
use crate::repositories::study_group::{PgStudyGroupRepository, StudyGroupRepository};

/// Broadcast capacity for participant-change fan-out.
pub const NOTIFY_BUFFER_SLOTS: usize = 256;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: Pool,
    /// The Redis connection manager.
    pub redis: ConnectionManager,
    /// The application's configuration.
    pub config: Config,
    /// The study-group repository.
    pub groups: Arc<dyn StudyGroupRepository>,
    /// Participant-change fan-out to dashboard observers.
    pub notifier: ParticipantNotifier,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = crate::db::create_pool(&config.database_url)?;
        tracing::info!("✅ PostgreSQL pool initialized with deadpool-postgres");

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis connection manager initialized (pooled)");

        let groups: Arc<dyn StudyGroupRepository> =
            Arc::new(PgStudyGroupRepository::new(db.clone()));
        tracing::info!("✅ Study group repository initialized");

        let notifier = ParticipantNotifier::new(NOTIFY_BUFFER_SLOTS);
        tracing::info!("✅ Participant notifier initialized");

        Ok(AppState {
            db,
            redis,
            config: config.clone(),
            groups,
            notifier,
        })
    }
}
