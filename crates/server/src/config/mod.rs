mod blob;
mod database;
mod gateway;
mod server;


pub use blob::*;
pub use database::*;
pub use gateway::*;
pub use server::*;

use std::path::Path;

use serde::Deserialize;

use contacts_core::PhotoPolicy;

use crate::error::ServerError;

/// Top-level configuration for the contacts server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct ContactsConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Photo blob store configuration.
    #[serde(default)]
    pub blob: BlobConfig,
    /// Flow timeouts and lock settings.
    #[serde(default)]
    pub gateway: GatewaySettings,
    /// Accepted photo sizes and types.
    #[serde(default)]
    pub photos: PhotoPolicy,
}

impl ContactsConfig {
    /// Parse a TOML document. An empty document yields the defaults.
    pub fn from_toml(contents: &str) -> Result<Self, ServerError> {
        toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read `path`, falling back to the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ServerError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Unset and empty variables are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ServerError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            self.server.port = parse_port("PORT", &port)?;
        }

        if let Some(url) = get("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(port) = get("DB_PORT") {
            self.database.port = parse_port("DB_PORT", &port)?;
        }
        set_from(&mut self.database.host, get("DB_HOST"));
        set_from(&mut self.database.user, get("DB_USER"));
        set_from(&mut self.database.password, get("DB_PASSWORD"));
        set_from(&mut self.database.name, get("DB_NAME"));

        set_from(&mut self.blob.region, get("AWS_REGION"));
        set_from(&mut self.blob.bucket, get("AWS_BUCKET_NAME"));
        set_from(&mut self.blob.access_key_id, get("AWS_ACCESS_KEY_ID"));
        set_from(&mut self.blob.secret_access_key, get("AWS_SECRET_ACCESS_KEY"));
        set_from(&mut self.blob.endpoint_url, get("AWS_ENDPOINT_URL"));
        Ok(())
    }

    /// Check the whole configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ServerError> {
        let mut problems: Vec<String> = Vec::new();

        match self.database.backend.as_str() {
            "postgres" | "memory" => {}
            other => problems.push(format!("unknown database backend: {other}")),
        }
        match self.blob.backend.as_str() {
            "s3" | "memory" => {}
            other => problems.push(format!("unknown blob backend: {other}")),
        }

        let missing: Vec<&str> = self
            .database
            .missing_keys()
            .into_iter()
            .chain(self.blob.missing_keys())
            .collect();
        if !missing.is_empty() {
            problems.push(format!("missing required keys: {}", missing.join(", ")));
        }

        if self.database.pool_size == 0 {
            problems.push("database.pool_size must be at least 1".to_owned());
        }
        for key in self.gateway.zero_timeouts() {
            problems.push(format!("{key} must be greater than zero"));
        }
        let longest_flow = self.gateway.longest_flow_ms();
        if self.gateway.lock_ttl_ms < longest_flow {
            problems.push(format!(
                "gateway.lock_ttl_ms ({}) must cover the longest flow ({longest_flow} ms: 2 x metadata_timeout_ms + blob_put_timeout_ms + blob_delete_timeout_ms)",
                self.gateway.lock_ttl_ms
            ));
        }

        let max_photo = usize::try_from(self.photos.max_bytes).unwrap_or(usize::MAX);
        if self.server.max_body_bytes < max_photo {
            problems.push(format!(
                "server.max_body_bytes ({}) is smaller than photos.max_bytes ({max_photo})",
                self.server.max_body_bytes
            ));
        }
        if self.photos.allowed_types.is_empty() || self.photos.allowed_extensions.is_empty() {
            problems.push("photos.allowed_types and photos.allowed_extensions must not be empty".to_owned());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ServerError::Config(problems.join("; ")))
        }
    }
}

fn set_from(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, ServerError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::Config(format!("{key} is not a valid port: {value}")))
}
