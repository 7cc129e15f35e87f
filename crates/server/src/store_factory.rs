use std::sync::Arc;

use contacts_store::{ContactStore, DistributedLock};
use contacts_store_memory::{MemoryContactStore, MemoryDistributedLock};
#[cfg(feature = "postgres")]
use contacts_store_postgres::{
    PostgresConfig, PostgresContactStore, PostgresDistributedLock, run_migrations,
};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::ServerError;

/// Metadata store and lock backend sharing one configuration.
pub type StoreBackends = (Arc<dyn ContactStore>, Arc<dyn DistributedLock>);

/// Create the contact store and the per-contact lock from the given
/// configuration. The Postgres backend opens a single pool shared by both.
#[allow(clippy::unused_async)]
pub async fn create_store(config: &DatabaseConfig) -> Result<StoreBackends, ServerError> {
    match config.backend.as_str() {
        "memory" => {
            info!("using in-memory contact store; data is lost on restart");
            Ok((
                Arc::new(MemoryContactStore::new()),
                Arc::new(MemoryDistributedLock::new()),
            ))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let pg_config = postgres_config(config);
            let pool = contacts_store_postgres::store::connect(&pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("database: {e}")))?;

            if config.run_migrations {
                run_migrations(&pool, &pg_config)
                    .await
                    .map_err(|e| ServerError::Config(format!("database migrations: {e}")))?;
            }

            info!(
                host = pg_config.host.as_str(),
                database = pg_config.database.as_str(),
                pool_size = pg_config.pool_size,
                "postgres contact store ready"
            );
            let lock = PostgresDistributedLock::from_pool(pool.clone(), pg_config.clone());
            let store = PostgresContactStore::from_pool(pool, pg_config);
            Ok((Arc::new(store), Arc::new(lock)))
        }
        other => Err(ServerError::Config(format!(
            "unknown database backend: {other} (is the feature enabled?)"
        ))),
    }
}

/// Create the tables for the configured backend without starting the server.
#[allow(clippy::unused_async)]
pub async fn migrate(config: &DatabaseConfig) -> Result<(), ServerError> {
    match config.backend.as_str() {
        "memory" => {
            info!("memory backend has no schema to migrate");
            Ok(())
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let pg_config = postgres_config(config);
            let pool = contacts_store_postgres::store::connect(&pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("database: {e}")))?;
            run_migrations(&pool, &pg_config)
                .await
                .map_err(|e| ServerError::Config(format!("database migrations: {e}")))?;
            info!(schema = %pg_config.schema, "postgres migrations complete");
            Ok(())
        }
        other => Err(ServerError::Config(format!(
            "unknown database backend: {other} (is the feature enabled?)"
        ))),
    }
}

#[cfg(feature = "postgres")]
fn postgres_config(config: &DatabaseConfig) -> PostgresConfig {
    let defaults = PostgresConfig::default();
    PostgresConfig {
        url: config.url.clone(),
        host: config.host.clone().unwrap_or(defaults.host),
        port: config.port,
        user: config.user.clone().unwrap_or(defaults.user),
        password: config.password.clone().unwrap_or(defaults.password),
        database: config.name.clone().unwrap_or(defaults.database),
        pool_size: config.pool_size,
        acquire_timeout: std::time::Duration::from_secs(config.acquire_timeout_seconds),
        schema: config.schema.clone(),
        table_prefix: config.table_prefix.clone(),
        ssl_mode: config.ssl_mode.clone(),
        ssl_root_cert: config.ssl_root_cert.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend() {
        let config = DatabaseConfig {
            backend: "memory".into(),
            ..DatabaseConfig::default()
        };
        let (store, lock) = create_store(&config).await.unwrap();
        assert!(store.list(contacts_core::ContactOrder::Name).await.unwrap().is_empty());
        let guard = lock
            .try_acquire("contact:1", std::time::Duration::from_secs(1))
            .await
            .unwrap();
        assert!(guard.is_some());
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let config = DatabaseConfig {
            backend: "mysql".into(),
            ..DatabaseConfig::default()
        };
        let err = create_store(&config).await.err().unwrap();
        assert!(err.to_string().contains("mysql"));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn postgres_config_maps_fields() {
        let config = DatabaseConfig {
            host: Some("db".into()),
            user: Some("agenda".into()),
            password: Some("pw".into()),
            name: Some("contactos".into()),
            pool_size: 3,
            table_prefix: "t_".into(),
            ..DatabaseConfig::default()
        };
        let pg = postgres_config(&config);
        assert_eq!(pg.host, "db");
        assert_eq!(pg.database, "contactos");
        assert_eq!(pg.pool_size, 3);
        assert_eq!(pg.table_prefix, "t_");
        assert_eq!(pg.acquire_timeout, std::time::Duration::from_secs(30));
    }
}
