pub mod client;
pub mod fetcher;
pub mod provider;

pub use client::S3Client;
pub use fetcher::{FetchError, ObjectFetcher, ObjectReader};
pub use provider::{ProviderConfig, StaticCredentials, create_s3_client};
