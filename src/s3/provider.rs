use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::error::DisplayErrorContext;

use crate::config::ConfigError;

/// Configuration for creating the S3 client
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Region the bucket lives in
    pub region: String,
    /// Optional custom endpoint URL (S3-compatible stores, LocalStack)
    pub endpoint_url: Option<String>,
    /// Whether to use path-style addressing (required for some S3-compatible services)
    pub force_path_style: bool,
    /// Static credentials; when unset the default AWS provider chain is used
    pub credentials: Option<StaticCredentials>,
}

#[derive(Clone)]
pub struct StaticCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .finish()
    }
}

/// Build the SDK client used for object fetches.
///
/// SDK-level retries are disabled: each object gets exactly one attempt.
pub async fn create_s3_client(config: ProviderConfig) -> Result<Client, ConfigError> {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let Some(creds) = config.credentials {
        loader = loader.credentials_provider(Credentials::new(
            creds.access_key,
            creds.secret_key,
            None,
            None,
            "s3zipper-static",
        ));
    }

    let base_config = loader.load().await;
    let provider = base_config
        .credentials_provider()
        .ok_or_else(|| ConfigError::MissingCredentials("no credentials provider".to_string()))?;
    verify_credentials(&provider).await?;

    let mut s3_config_builder =
        aws_sdk_s3::config::Builder::from(&base_config).retry_config(RetryConfig::disabled());

    if let Some(endpoint) = config.endpoint_url {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }

    if config.force_path_style {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    Ok(Client::from_conf(s3_config_builder.build()))
}

/// Resolve credentials once. Without them the process must not serve.
pub async fn verify_credentials(provider: &SharedCredentialsProvider) -> Result<(), ConfigError> {
    provider
        .provide_credentials()
        .await
        .map(|_| ())
        .map_err(|e| ConfigError::MissingCredentials(DisplayErrorContext(&e).to_string()))
}
