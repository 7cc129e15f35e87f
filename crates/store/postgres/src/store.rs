use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, info};

use contacts_core::{Contact, ContactOrder, ContactRecord};
use contacts_store::error::StoreError;
use contacts_store::store::ContactStore;

use crate::config::PostgresConfig;
use crate::migrations;

const COLUMNS: &str = "id, nombre, apellidos, correo, fecha_nac, foto_url, created_at, updated_at";

type ContactRow = (
    i64,
    String,
    String,
    String,
    NaiveDate,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn into_contact(row: ContactRow) -> Contact {
    let (id, first_name, last_name, email, birth_date, photo_ref, created_at, updated_at) = row;
    Contact {
        id,
        first_name,
        last_name,
        email,
        birth_date,
        photo_ref,
        created_at,
        updated_at,
    }
}

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying SSL settings
/// when configured.
pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, StoreError> {
    let mut options: sqlx::postgres::PgConnectOptions = match &config.url {
        Some(url) => url
            .parse()
            .map_err(|e: sqlx::Error| StoreError::Connection(e.to_string()))?,
        None => sqlx::postgres::PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database),
    };

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(StoreError::Connection(format!("unknown ssl_mode: {other}")));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    if let Some(ref path) = config.ssl_root_cert {
        options = options.ssl_root_cert(path);
    }

    Ok(options)
}

/// Open a bounded pool for `config`. Callers beyond `pool_size` queue until
/// `acquire_timeout`.
///
/// # Errors
///
/// Returns [`StoreError::Connection`] if the options are invalid or the first
/// connection cannot be established.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let connect_options = build_connect_options(config)?;
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))
}

/// Escape `\`, `%` and `_` so `pattern` is matched literally by `ILIKE`.
pub(crate) fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len() + 2);
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// PostgreSQL-backed implementation of [`ContactStore`].
///
/// Uses `sqlx::PgPool` for connection pooling. Email uniqueness is enforced
/// by the `UNIQUE` constraint on `correo`.
pub struct PostgresContactStore {
    pool: PgPool,
    config: Arc<PostgresConfig>,
}

impl PostgresContactStore {
    /// Create a new `PostgresContactStore` from the provided configuration.
    ///
    /// Connects to `PostgreSQL`, creates the connection pool, and runs
    /// migrations to ensure the required tables exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if pool creation fails, or
    /// [`StoreError::Backend`] if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StoreError> {
        let pool = connect(&config).await?;

        migrations::run_migrations(&pool, &config)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        info!(table = %config.contacts_table(), pool_size = config.pool_size, "postgres contact store ready");
        Ok(Self {
            pool,
            config: Arc::new(config),
        })
    }

    /// Create a `PostgresContactStore` from an existing pool and config,
    /// without running migrations.
    pub fn from_pool(pool: PgPool, config: PostgresConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// The underlying pool, for sharing with the lock backend.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_error(&self, err: sqlx::Error) -> StoreError {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout(self.config.acquire_timeout),
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }

    fn map_write_error(&self, err: sqlx::Error, email: &str) -> StoreError {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            return StoreError::DuplicateEmail(email.to_owned());
        }
        self.map_error(err)
    }
}

#[async_trait]
impl ContactStore for PostgresContactStore {
    async fn create(&self, record: &ContactRecord) -> Result<i64, StoreError> {
        let table = self.config.contacts_table();
        let fields = &record.fields;
        let query = format!(
            "INSERT INTO {table} (nombre, apellidos, correo, fecha_nac, foto_url) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id"
        );

        let (id,): (i64,) = sqlx::query_as(&query)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.email)
            .bind(fields.birth_date)
            .bind(record.photo_ref.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.map_write_error(e, &fields.email))?;

        debug!(contact.id = id, "contact row inserted");
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Contact, StoreError> {
        let table = self.config.contacts_table();
        let query = format!("SELECT {COLUMNS} FROM {table} WHERE id = $1");

        let row: Option<ContactRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.map_error(e))?;

        row.map(into_contact).ok_or(StoreError::NotFound(id))
    }

    async fn list(&self, order: ContactOrder) -> Result<Vec<Contact>, StoreError> {
        let table = self.config.contacts_table();
        let order_by = match order {
            ContactOrder::Name => "apellidos, nombre, id",
            ContactOrder::Newest => "created_at DESC, id DESC",
        };
        let query = format!("SELECT {COLUMNS} FROM {table} ORDER BY {order_by}");

        let rows: Vec<ContactRow> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.map_error(e))?;

        Ok(rows.into_iter().map(into_contact).collect())
    }

    async fn search_by_last_name(&self, pattern: &str) -> Result<Vec<Contact>, StoreError> {
        let table = self.config.contacts_table();
        let query = format!(
            "SELECT {COLUMNS} FROM {table} \
             WHERE apellidos ILIKE $1 ESCAPE '\\' \
             ORDER BY apellidos, nombre, id"
        );

        let rows: Vec<ContactRow> = sqlx::query_as(&query)
            .bind(format!("%{}%", escape_like(pattern)))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.map_error(e))?;

        Ok(rows.into_iter().map(into_contact).collect())
    }

    async fn update(&self, id: i64, record: &ContactRecord) -> Result<(), StoreError> {
        let table = self.config.contacts_table();
        let fields = &record.fields;
        let query = format!(
            "UPDATE {table} \
             SET nombre = $1, apellidos = $2, correo = $3, fecha_nac = $4, foto_url = $5, \
                 updated_at = NOW() \
             WHERE id = $6"
        );

        let result = sqlx::query(&query)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.email)
            .bind(fields.birth_date)
            .bind(record.photo_ref.as_deref())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_write_error(e, &fields.email))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let table = self.config.contacts_table();
        let query = format!("DELETE FROM {table} WHERE id = $1");

        let result = sqlx::query(&query)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| self.map_error(e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("lopez"), "lopez");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }

    #[test]
    fn connect_options_reject_unknown_ssl_mode() {
        let config = PostgresConfig {
            ssl_mode: Some("sometimes".into()),
            ..PostgresConfig::default()
        };
        let err = build_connect_options(&config).unwrap_err();
        assert!(matches!(err, StoreError::Connection(msg) if msg.contains("sometimes")));
    }

    #[test]
    fn connect_options_from_fields() {
        let config = PostgresConfig {
            host: "db.internal".into(),
            port: 6543,
            database: "agenda".into(),
            ..PostgresConfig::default()
        };
        let options = build_connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_database(), Some("agenda"));
    }

    #[test]
    fn connect_options_url_takes_precedence() {
        let config = PostgresConfig {
            url: Some("postgres://app@url-host:5433/from_url".into()),
            host: "ignored".into(),
            ..PostgresConfig::default()
        };
        let options = build_connect_options(&config).unwrap();
        assert_eq!(options.get_host(), "url-host");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("from_url"));
    }
}
