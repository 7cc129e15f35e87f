use serde::Deserialize;

/// Metadata store configuration.
#[derive(Deserialize)]
pub struct DatabaseConfig {
    /// Which backend to use: `"postgres"` or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Full connection URL. When set, the discrete connection fields are not
    /// required.
    pub url: Option<String>,

    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database name.
    pub name: Option<String>,

    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Seconds a request waits for a pooled connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,

    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default)]
    pub table_prefix: String,

    /// `disable`, `prefer`, `require`, `verify-ca` or `verify-full`.
    pub ssl_mode: Option<String>,

    pub ssl_root_cert: Option<String>,

    /// Create missing tables at startup.
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .field("pool_size", &self.pool_size)
            .field("acquire_timeout_seconds", &self.acquire_timeout_seconds)
            .field("schema", &self.schema)
            .field("table_prefix", &self.table_prefix)
            .field("ssl_mode", &self.ssl_mode)
            .field("run_migrations", &self.run_migrations)
            .finish_non_exhaustive()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            host: None,
            port: default_port(),
            user: None,
            password: None,
            name: None,
            pool_size: default_pool_size(),
            acquire_timeout_seconds: default_acquire_timeout(),
            schema: default_schema(),
            table_prefix: String::new(),
            ssl_mode: None,
            ssl_root_cert: None,
            run_migrations: default_run_migrations(),
        }
    }
}

impl DatabaseConfig {
    /// Names of the keys the selected backend needs but does not have.
    pub(crate) fn missing_keys(&self) -> Vec<&'static str> {
        if self.backend != "postgres" || self.url.is_some() {
            return Vec::new();
        }
        let required = [
            ("database.host (DB_HOST)", &self.host),
            ("database.user (DB_USER)", &self.user),
            ("database.password (DB_PASSWORD)", &self.password),
            ("database.name (DB_NAME)", &self.name),
        ];
        required
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_none_or(str::is_empty))
            .map(|(key, _)| key)
            .collect()
    }
}

fn default_backend() -> String {
    "postgres".to_owned()
}

fn default_port() -> u16 {
    5432
}

fn default_pool_size() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_schema() -> String {
    "public".to_owned()
}

fn default_run_migrations() -> bool {
    true
}
