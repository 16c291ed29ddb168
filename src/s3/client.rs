use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;

use super::fetcher::{FetchError, ObjectFetcher, ObjectReader};

/// S3 client bound to the bucket archives are assembled from
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Wrap an already configured SDK client
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        S3Client {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectFetcher for S3Client {
    async fn open(&self, storage_path: &str) -> Result<ObjectReader, FetchError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(storage_path)
            .send()
            .await
            .map_err(|err| classify_get_error(storage_path, err))?;

        Ok(Box::pin(resp.body.into_async_read()))
    }
}

/// Map an SDK failure onto the two failure kinds callers care about
fn classify_get_error(storage_path: &str, err: SdkError<GetObjectError>) -> FetchError {
    let no_such_key = err
        .as_service_error()
        .is_some_and(GetObjectError::is_no_such_key);
    let status_404 = err
        .raw_response()
        .is_some_and(|resp| resp.status().as_u16() == 404);

    if no_such_key || status_404 {
        FetchError::NotFound {
            path: storage_path.to_string(),
        }
    } else {
        FetchError::other(storage_path, DisplayErrorContext(&err).to_string())
    }
}
