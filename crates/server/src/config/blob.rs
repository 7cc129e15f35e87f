use serde::Deserialize;

/// Photo blob store configuration.
#[derive(Deserialize)]
pub struct BlobConfig {
    /// Which backend to use: `"s3"` or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    pub region: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Endpoint override for S3-compatible services (`MinIO`, `LocalStack`).
    pub endpoint_url: Option<String>,

    /// Base URL prepended to object keys to form the stored locator
    /// (e.g. a CDN in front of the bucket).
    pub public_base_url: Option<String>,

    /// Key namespace for photos.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Address the bucket by path instead of virtual host.
    #[serde(default)]
    pub force_path_style: bool,
}

impl std::fmt::Debug for BlobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobConfig")
            .field("backend", &self.backend)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .field("public_base_url", &self.public_base_url)
            .field("prefix", &self.prefix)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            endpoint_url: None,
            public_base_url: None,
            prefix: default_prefix(),
            force_path_style: false,
        }
    }
}

impl BlobConfig {
    pub(crate) fn missing_keys(&self) -> Vec<&'static str> {
        if self.backend != "s3" {
            return Vec::new();
        }
        let required = [
            ("blob.region (AWS_REGION)", &self.region),
            ("blob.bucket (AWS_BUCKET_NAME)", &self.bucket),
            ("blob.access_key_id (AWS_ACCESS_KEY_ID)", &self.access_key_id),
            (
                "blob.secret_access_key (AWS_SECRET_ACCESS_KEY)",
                &self.secret_access_key,
            ),
        ];
        required
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_none_or(str::is_empty))
            .map(|(key, _)| key)
            .collect()
    }
}

fn default_backend() -> String {
    "s3".to_owned()
}

fn default_prefix() -> String {
    contacts_blob::DEFAULT_KEY_PREFIX.to_owned()
}
