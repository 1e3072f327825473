use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use vitrina_core::config::{AppConfig, ConfigError};
use vitrina_db::{connect_with_config, migrations, DbPool, SqlCartRepository, SqlProductRepository};
use vitrina_services::{CartService, ChangeNotifier, ProductService, ViewerRegistry};

use crate::api::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let state = wire_services(&config, db_pool.clone());

    Ok(Application { config, db_pool, state })
}

/// Builds the repositories, the viewer registry and both services on top of one pool.
pub fn wire_services(config: &AppConfig, db_pool: DbPool) -> AppState {
    let products = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let carts = Arc::new(SqlCartRepository::new(db_pool.clone()));
    let registry = Arc::new(ViewerRegistry::new(products.clone(), config.notifier.channel_capacity));
    let notifier: Arc<dyn ChangeNotifier> = registry.clone();

    AppState {
        products: Arc::new(ProductService::new(
            products.clone(),
            notifier,
            config.catalog.page_defaults(),
        )),
        carts: Arc::new(CartService::new(carts, products)),
        viewers: registry,
        db_pool,
    }
}
