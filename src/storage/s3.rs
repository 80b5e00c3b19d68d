//! AWS S3 object store and upload signer.
//!
//! Objects are streamed straight from the response body into the CSV
//! reader; nothing is buffered whole in memory.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::{AppError, Result};
use crate::models::ObjectLocation;
use crate::storage::{ObjectReader, ObjectStore, UploadSigner};

/// Characters left as-is in a `CopySource` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// S3-backed object storage.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

/// `CopySource` value for a location: `bucket/url-encoded-key`.
pub fn copy_source(location: &ObjectLocation) -> String {
    format!(
        "{}/{}",
        location.bucket,
        utf8_percent_encode(&location.key, COPY_SOURCE)
    )
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn open(&self, location: &ObjectLocation) -> Result<ObjectReader> {
        let result = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await;

        match result {
            Ok(output) => Ok(Box::pin(output.body.into_async_read())),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Err(AppError::not_found(&location.bucket, &location.key))
                } else {
                    Err(AppError::storage(format!(
                        "GetObject {} failed: {}",
                        location,
                        DisplayErrorContext(&service_err)
                    )))
                }
            }
        }
    }

    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(from))
            .bucket(&to.bucket)
            .key(&to.key)
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "CopyObject {} -> {} failed: {}",
                    from,
                    to,
                    DisplayErrorContext(&e)
                ))
            })?;

        log::info!("Copied {} to {}", from, to);
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "DeleteObject {} failed: {}",
                    location,
                    DisplayErrorContext(&e)
                ))
            })?;

        log::info!("Deleted {}", location);
        Ok(())
    }
}

#[async_trait]
impl UploadSigner for S3ObjectStore {
    async fn presign_put(
        &self,
        location: &ObjectLocation,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::config(format!("Invalid presign expiry: {e}")))?;

        let request = self
            .client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "Presigning {} failed: {}",
                    location,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(request.uri().to_string())
    }
}
