use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use strum_macros::{Display, EnumString};

use crate::store::mysql::is_valid_collection_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Mysql,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub api_prefix: String,

    // Store
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub collection: String,
    pub poll_interval: Duration,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let store_backend = var("STORE_BACKEND", "memory");
        let store_backend: StoreBackend = store_backend
            .parse()
            .with_context(|| format!("STORE_BACKEND must be memory or mysql, got {store_backend:?}"))?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if store_backend == StoreBackend::Mysql && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=mysql");
        }

        let collection = var("COLLECTION", "employees");
        if !is_valid_collection_name(&collection) {
            bail!("COLLECTION must be a plain identifier, got {collection:?}");
        }

        let poll_interval_ms: u64 = var("POLL_INTERVAL_MS", "1000")
            .parse()
            .context("POLL_INTERVAL_MS must be a number of milliseconds")?;
        if poll_interval_ms == 0 {
            bail!("POLL_INTERVAL_MS must be greater than zero");
        }

        let log_level = var("LOG_LEVEL", "debug");
        let log_level: tracing::Level = log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("LOG_LEVEL is not a tracing level: {log_level:?}"))?;

        Ok(Self {
            server_addr: var("SERVER_ADDR", "127.0.0.1:8080"),
            api_prefix: var("API_PREFIX", "/api"),
            store_backend,
            database_url,
            collection,
            poll_interval: Duration::from_millis(poll_interval_ms),
            log_dir: var("LOG_DIR", "logs"),
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_memory_store() {
        let config = config(&[]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.server_addr, "127.0.0.1:8080");
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.collection, "employees");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn mysql_requires_database_url() {
        assert!(config(&[("STORE_BACKEND", "mysql")]).is_err());
        let config = config(&[
            ("STORE_BACKEND", "mysql"),
            ("DATABASE_URL", "mysql://roster@localhost/roster"),
        ])
        .unwrap();
        assert_eq!(config.store_backend, StoreBackend::Mysql);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("STORE_BACKEND", "firestore")]).is_err());
        assert!(config(&[("COLLECTION", "employees;")]).is_err());
        assert!(config(&[("POLL_INTERVAL_MS", "soon")]).is_err());
        assert!(config(&[("POLL_INTERVAL_MS", "0")]).is_err());
        assert!(config(&[("LOG_LEVEL", "loud")]).is_err());
    }
}
