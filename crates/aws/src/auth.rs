use aws_sdk_s3::config::Credentials;
use tracing::debug;

use crate::config::AwsBaseConfig;

/// Load the SDK configuration the S3 client is built from.
///
/// A configured static key pair wins over the SDK's environment credential
/// chain (`AWS_PROFILE`, instance roles and so on).
///
/// ```no_run
/// use contacts_aws::config::AwsBaseConfig;
/// use contacts_aws::auth::build_sdk_config;
///
/// # async fn example() {
/// let config = AwsBaseConfig::new("us-east-1")
///     .with_endpoint_url("http://localhost:4566");
/// let sdk_config = build_sdk_config(&config).await;
/// # }
/// ```
pub async fn build_sdk_config(config: &AwsBaseConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    match config.static_credentials() {
        Some((access_key_id, secret_access_key)) => {
            debug!("using static AWS credentials from configuration");
            loader = loader.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "contacts-config",
            ));
        }
        None => debug!("using the default AWS credential chain"),
    }

    loader.load().await
}
