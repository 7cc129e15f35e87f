use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use contacts_blob::{BlobError, BlobStore, DEFAULT_KEY_PREFIX, KeyGenerator};

use crate::auth::build_sdk_config;
use crate::config::AwsBaseConfig;
use crate::error::classify_sdk_error;

/// Configuration for the S3 blob store.
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// Shared AWS configuration (region, credentials, endpoint URL).
    #[serde(flatten)]
    pub aws: AwsBaseConfig,

    /// Bucket holding the photos.
    pub bucket: String,

    /// Key prefix for all objects (defaults to `"contactos"`).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Base URL used to build public locators. Defaults to the virtual-hosted
    /// bucket URL, or `<endpoint_url>/<bucket>` when an endpoint override is
    /// configured.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Use path-style addressing (needed by most S3-compatible servers).
    #[serde(default)]
    pub force_path_style: bool,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("aws", &self.aws)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("public_base_url", &self.public_base_url)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

impl S3Config {
    /// Create a new `S3Config` for the given region and bucket.
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            aws: AwsBaseConfig::new(region),
            bucket: bucket.into(),
            prefix: None,
            public_base_url: None,
            force_path_style: false,
        }
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the endpoint URL override (for `LocalStack` / `MinIO`).
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.aws.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Set the base URL used for locators.
    #[must_use]
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    /// Base URL for locators, without a trailing slash.
    pub fn locator_base(&self) -> String {
        let base = match (&self.public_base_url, &self.aws.endpoint_url) {
            (Some(url), _) => url.clone(),
            (None, Some(endpoint)) => {
                format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket)
            }
            (None, None) => format!(
                "https://{}.s3.{}.amazonaws.com",
                self.bucket, self.aws.region
            ),
        };
        base.trim_end_matches('/').to_owned()
    }
}

/// [`BlobStore`] backed by an S3 bucket.
///
/// Locators are public URLs (`<base>/<key>`) so they can be rendered directly
/// in an `<img>` tag.
pub struct S3BlobStore {
    config: S3Config,
    client: aws_sdk_s3::Client,
    keys: KeyGenerator,
    base: String,
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish_non_exhaustive()
    }
}

impl S3BlobStore {
    /// Create a new `S3BlobStore` by building an AWS SDK client.
    pub async fn new(config: S3Config) -> Self {
        let sdk_config = build_sdk_config(&config.aws).await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);
        Self::with_client(config, client)
    }

    /// Create an `S3BlobStore` with a pre-built client.
    pub fn with_client(config: S3Config, client: aws_sdk_s3::Client) -> Self {
        let keys = KeyGenerator::new(
            config
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_owned()),
        );
        let base = config.locator_base();
        Self {
            config,
            client,
            keys,
            base,
        }
    }

    /// Build the public locator for `key`.
    pub fn locator_for(&self, key: &str) -> String {
        format!("{}/{key}", self.base)
    }

    /// Recover the object key from a locator.
    ///
    /// Locators built by [`locator_for`](Self::locator_for) are resolved
    /// directly. URLs from another host form for the same bucket (e.g. rows
    /// written with a different base URL) are accepted when their path lies
    /// under the configured prefix.
    pub fn key_from_locator(&self, locator: &str) -> Result<String, BlobError> {
        let candidate = if let Some(rest) = locator.strip_prefix(&self.base) {
            rest.strip_prefix('/')
        } else {
            locator
                .split_once("://")
                .and_then(|(_, after_scheme)| after_scheme.split_once('/'))
                .map(|(_, path)| path)
        };

        candidate
            .map(|key| key.trim_start_matches('/'))
            .filter(|key| !key.is_empty() && self.keys.owns(key))
            .map(str::to_owned)
            .ok_or_else(|| BlobError::InvalidLocator(locator.to_owned()))
    }
}

fn is_missing_object<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    matches!(err.code(), Some("NoSuchKey" | "NotFound"))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "s3"
    }

    #[instrument(skip(self, data), fields(blob_store = "s3", size = data.len()))]
    async fn put(
        &self,
        data: Bytes,
        suggested_name: &str,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let key = self.keys.next_key(suggested_name);
        debug!(bucket = %self.config.bucket, key = %key, "uploading object to S3");

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                let err_str = DisplayErrorContext(&e).to_string();
                error!(error = %err_str, key = %key, "S3 put_object failed");
                classify_sdk_error(&err_str).into_upload_failure()
            })?;

        let locator = self.locator_for(&key);
        info!(bucket = %self.config.bucket, key = %key, "S3 object uploaded");
        Ok(locator)
    }

    #[instrument(skip(self), fields(blob_store = "s3"))]
    async fn delete(&self, locator: &str) -> Result<(), BlobError> {
        let key = self.key_from_locator(locator)?;
        debug!(bucket = %self.config.bucket, key = %key, "deleting object from S3");

        match self
            .client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => {
                info!(bucket = %self.config.bucket, key = %key, "S3 object deleted");
                Ok(())
            }
            Err(e) if is_missing_object(&e) => {
                debug!(key = %key, "S3 object already absent");
                Ok(())
            }
            Err(e) => {
                let err_str = DisplayErrorContext(&e).to_string();
                error!(error = %err_str, key = %key, "S3 delete_object failed");
                Err(classify_sdk_error(&err_str).into_delete_failure())
            }
        }
    }

    async fn exists(&self, locator: &str) -> Result<bool, BlobError> {
        let key = self.key_from_locator(locator)?;
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => {
                let err_str = DisplayErrorContext(&e).to_string();
                error!(error = %err_str, key = %key, "S3 head_object failed");
                Err(classify_sdk_error(&err_str).into_unavailable())
            }
        }
    }
}
