use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::MySqlPool;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::store::{MemoryStore, MySqlStore, RecordStore};

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Build the record store selected by the configuration.
pub async fn init_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("Using in-process document store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Mysql => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the mysql store")?;
            let pool = init_db(database_url).await?;
            let store = MySqlStore::new(pool, &config.collection, config.poll_interval)?;
            store.ensure_collection().await?;
            info!(collection = %config.collection, "Using MySQL document store");
            Ok(Arc::new(store))
        }
    }
}
