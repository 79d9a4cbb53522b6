use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::fetcher::{worldbank::WorldBankFetcher, DataSource};

/// Shared by every request handler.
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub live_source: Arc<dyn DataSource>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Arc<Self> {
        let live_source = Arc::new(WorldBankFetcher::new(config.world_bank_base_url.clone()));
        Self::with_source(pool, config, live_source)
    }

    pub fn with_source(pool: SqlitePool, config: Config, live_source: Arc<dyn DataSource>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            config,
            live_source,
        })
    }
}
