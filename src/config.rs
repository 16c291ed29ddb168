//! Process configuration.
//!
//! Every setting can be given on the command line or through the environment
//! variable named next to it. The environment names match the ones the
//! service has always been deployed with (`AWS_BUCKET`, `REDIS_URL`, `PORT`, ...).

use clap::Parser;
use std::time::Duration;
use thiserror::Error;

use crate::s3::{ProviderConfig, StaticCredentials};

/// Errors that stop the process before it serves requests
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no AWS credentials available: {0}")]
    MissingCredentials(String),

    #[error("AWS_ACCESS_KEY and AWS_SECRET_KEY must be set together")]
    PartialCredentials,

    #[error("invalid Redis configuration: {0}")]
    Redis(String),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "s3zipper",
    version,
    about = "Serve ZIP archives of S3 objects, streamed as they are assembled"
)]
pub struct Settings {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Bucket holding the archived objects
    #[arg(long, env = "AWS_BUCKET")]
    pub bucket: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Static access key; the default AWS credential chain is used when unset
    #[arg(long, env = "AWS_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    #[arg(long, env = "AWS_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Custom S3 endpoint (S3-compatible stores, LocalStack)
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    #[arg(long, env = "AWS_FORCE_PATH_STYLE")]
    pub force_path_style: bool,

    /// Redis address, either `host:port` or a full `redis://` URL
    #[arg(long, env = "REDIS_URL", default_value = "127.0.0.1:6379")]
    pub redis_url: String,

    /// Redis password, sent with every new connection
    #[arg(long, env = "REDIS_AUTH", hide_env_values = true)]
    pub redis_auth: Option<String>,

    /// Maximum pooled Redis connections
    #[arg(long, env = "REDIS_POOL_SIZE", default_value_t = 10)]
    pub redis_pool_size: usize,

    /// Objects opened ahead of the one being written (1 = sequential)
    #[arg(long, env = "PREFETCH", default_value_t = 1)]
    pub prefetch: usize,

    /// Abort archive builds running longer than this many seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Settings {
    /// Check values clap cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "AWS_BUCKET",
                message: "must not be empty".to_string(),
            });
        }
        if self.redis_pool_size == 0 {
            return Err(ConfigError::Invalid {
                name: "REDIS_POOL_SIZE",
                message: "must be at least 1".to_string(),
            });
        }
        if self.prefetch == 0 {
            return Err(ConfigError::Invalid {
                name: "PREFETCH",
                message: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                name: "REQUEST_TIMEOUT_SECS",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn provider_config(&self) -> Result<ProviderConfig, ConfigError> {
        let credentials = match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => Some(StaticCredentials {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialCredentials),
        };

        Ok(ProviderConfig {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            credentials,
        })
    }

    /// Connection URL for the metadata store, with the password applied
    pub fn redis_connection_url(&self) -> String {
        redis_connection_url(&self.redis_url, self.redis_auth.as_deref())
    }
}

/// Turn a `host:port` address (or URL) plus optional password into a Redis URL.
///
/// A password already present in a full URL wins over `auth`.
pub fn redis_connection_url(address: &str, auth: Option<&str>) -> String {
    let auth = auth.filter(|a| !a.is_empty());

    if let Some((scheme, rest)) = address.split_once("://") {
        return match auth {
            Some(password) if !rest.contains('@') => format!("{scheme}://:{password}@{rest}"),
            _ => address.to_string(),
        };
    }

    match auth {
        Some(password) => format!("redis://:{password}@{address}"),
        None => format!("redis://{address}"),
    }
}
