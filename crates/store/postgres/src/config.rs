use std::time::Duration;

/// Configuration for the `PostgreSQL` contact store and lock backends.
#[derive(Clone)]
pub struct PostgresConfig {
    /// Full connection URL. When set, it takes precedence over the discrete
    /// connection fields below.
    pub url: Option<String>,

    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,

    /// Maximum number of connections in the `sqlx` connection pool.
    pub pool_size: u32,

    /// How long a caller waits for a pooled connection before the call fails
    /// with a timeout.
    pub acquire_timeout: Duration,

    /// Database schema to use for tables (e.g. `"public"`).
    pub schema: String,

    /// Prefix applied to table names to avoid collisions.
    pub table_prefix: String,

    /// SSL mode for the connection (`disable`, `prefer`, `require`, `verify-ca`, `verify-full`).
    pub ssl_mode: Option<String>,

    /// Path to the CA certificate for SSL server verification.
    pub ssl_root_cert: Option<String>,
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("schema", &self.schema)
            .field("table_prefix", &self.table_prefix)
            .field("ssl_mode", &self.ssl_mode)
            .finish_non_exhaustive()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: String::from("localhost"),
            port: 5432,
            user: String::from("postgres"),
            password: String::new(),
            database: String::from("agenda"),
            pool_size: 10,
            acquire_timeout: Duration::from_secs(30),
            schema: String::from("public"),
            table_prefix: String::new(),
            ssl_mode: None,
            ssl_root_cert: None,
        }
    }
}

impl PostgresConfig {
    /// Return the fully-qualified contacts table name (`schema.prefix_contactos`).
    pub(crate) fn contacts_table(&self) -> String {
        format!("{}.{}contactos", self.schema, self.table_prefix)
    }

    /// Return the fully-qualified locks table name (`schema.prefix_contact_locks`).
    pub(crate) fn locks_table(&self) -> String {
        format!("{}.{}contact_locks", self.schema, self.table_prefix)
    }
}
