pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod middleware;
pub mod models;
pub mod reconcile;
pub mod routes;

use config::Config;
use directory::Directory;
use reconcile::Synchronizer;
use std::sync::Arc;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub directory: Arc<dyn Directory>,
    pub synchronizer: Synchronizer,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: Config, directory: Arc<dyn Directory>) -> Self {
        let synchronizer = Synchronizer::new(
            db.clone(),
            directory.clone(),
            reconcile::SyncOptions::from_config(&config),
        );
        Self {
            db,
            config,
            directory,
            synchronizer,
        }
    }
}
