pub mod error;
pub mod routes;

use std::sync::Arc;

use db::DBService;
use services::services::{
    config::Config, email::EmailService, events::EventHub, gamification::GamificationService,
};

/// Shared application state handed to every route handler.
#[derive(Clone)]
pub struct Deployment {
    db: DBService,
    config: Arc<Config>,
    events: EventHub,
    email: EmailService,
    gamification: GamificationService,
}

impl Deployment {
    /// Open the configured database and wire up the shared services.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let data_dir = Config::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let db_path = config.database.resolved_path(&data_dir);
        let db = DBService::new(&db_path).await?;
        Ok(Self::from_parts(db, config))
    }

    /// State backed by an in-memory database; used by the API tests.
    pub async fn new_in_memory(config: Config) -> anyhow::Result<Self> {
        let db = DBService::new_in_memory().await?;
        Ok(Self::from_parts(db, config))
    }

    fn from_parts(db: DBService, config: Config) -> Self {
        let events = EventHub::new(config.events.channel_capacity);
        let email = EmailService::from_config(&config.email);
        let gamification = GamificationService::new(db.pool.clone());
        Self {
            db,
            config: Arc::new(config),
            events,
            email,
            gamification,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn email(&self) -> &EmailService {
        &self.email
    }

    pub fn gamification(&self) -> &GamificationService {
        &self.gamification
    }
}
