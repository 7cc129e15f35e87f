use std::sync::Arc;

use contacts_blob::{BlobStore, MemoryBlobStore};
#[cfg(feature = "s3")]
use contacts_aws::{AwsBaseConfig, S3BlobStore, S3Config};
use tracing::info;

use crate::config::BlobConfig;
use crate::error::ServerError;

/// Create the photo blob store from the given configuration.
#[allow(clippy::unused_async)]
pub async fn create_blob_store(config: &BlobConfig) -> Result<Arc<dyn BlobStore>, ServerError> {
    match config.backend.as_str() {
        "memory" => {
            info!(prefix = %config.prefix, "using in-memory blob store; photos are lost on restart");
            Ok(Arc::new(MemoryBlobStore::with_prefix(config.prefix.clone())))
        }
        #[cfg(feature = "s3")]
        "s3" => {
            let s3_config = s3_config(config)?;
            info!(
                bucket = %s3_config.bucket,
                region = %s3_config.aws.region,
                locator_base = %s3_config.locator_base(),
                "s3 blob store ready"
            );
            Ok(Arc::new(S3BlobStore::new(s3_config).await))
        }
        other => Err(ServerError::Config(format!(
            "unknown blob backend: {other} (is the feature enabled?)"
        ))),
    }
}

#[cfg(feature = "s3")]
fn s3_config(config: &BlobConfig) -> Result<S3Config, ServerError> {
    let region = config
        .region
        .clone()
        .ok_or_else(|| ServerError::Config("s3 blob backend requires [blob] region".into()))?;
    let bucket = config
        .bucket
        .clone()
        .ok_or_else(|| ServerError::Config("s3 blob backend requires [blob] bucket".into()))?;

    let mut aws = AwsBaseConfig::new(region);
    if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
        aws = aws.with_static_credentials(key, secret);
    }
    if let Some(endpoint) = &config.endpoint_url {
        aws = aws.with_endpoint_url(endpoint);
    }

    Ok(S3Config {
        aws,
        bucket,
        prefix: Some(config.prefix.clone()),
        public_base_url: config.public_base_url.clone(),
        force_path_style: config.force_path_style,
    })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn memory_backend_uses_prefix() {
        let config = BlobConfig {
            backend: "memory".into(),
            prefix: "fotos".into(),
            ..BlobConfig::default()
        };
        let store = create_blob_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
        let locator = store
            .put(Bytes::from_static(b"img"), "a.png", "image/png")
            .await
            .unwrap();
        assert!(locator.starts_with("memory://fotos/"));
    }

    #[tokio::test]
    async fn unknown_backend_is_rejected() {
        let config = BlobConfig {
            backend: "gcs".into(),
            ..BlobConfig::default()
        };
        let err = create_blob_store(&config).await.err().unwrap();
        assert!(err.to_string().contains("gcs"));
    }

    #[cfg(feature = "s3")]
    #[test]
    fn s3_config_maps_fields() {
        let config = BlobConfig {
            region: Some("eu-west-1".into()),
            bucket: Some("fotos".into()),
            access_key_id: Some("AKIA".into()),
            secret_access_key: Some("shh".into()),
            endpoint_url: Some("http://localhost:9000".into()),
            force_path_style: true,
            ..BlobConfig::default()
        };
        let s3 = s3_config(&config).unwrap();
        assert_eq!(s3.bucket, "fotos");
        assert_eq!(s3.aws.static_credentials(), Some(("AKIA", "shh")));
        assert_eq!(s3.locator_base(), "http://localhost:9000/fotos");
        assert!(s3.force_path_style);
    }

    #[cfg(feature = "s3")]
    #[test]
    fn s3_config_requires_bucket() {
        let config = BlobConfig {
            region: Some("eu-west-1".into()),
            ..BlobConfig::default()
        };
        assert!(s3_config(&config).is_err());
    }
}
