//! Lambda entry point: `GET /import?name=<file>` -> presigned upload URL.
//!
//! ## Environment Variables
//!
//! - `BUCKET_NAME`: Bucket receiving uploads
//! - `UPLOADED_PREFIX`: Prefix of new uploads (default: `uploaded/`)
//! - `UPLOAD_EXPIRY_SECS`: URL lifetime (default: 3600)
//! - `RUST_LOG` or `LOG_LEVEL`: Log filter (e.g., `info`, `debug`)

use std::sync::Arc;

use catalog_import::lambda::{self, import_products_file};
use catalog_import::services::UploadIssuer;
use catalog_import::storage::s3::S3ObjectStore;
use lambda_http::{Error as LambdaError, Request, service_fn};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    lambda::init_tracing();

    let config = lambda::load_lambda_config()?;
    let aws = lambda::load_aws_config().await;

    let issuer = Arc::new(UploadIssuer::new(
        &config.import,
        Arc::new(S3ObjectStore::from_conf(&aws)),
    ));

    info!(bucket = %config.import.bucket, "Upload URL issuer initialized");

    lambda_http::run(service_fn(|request: Request| {
        let issuer = Arc::clone(&issuer);
        async move { import_products_file::handler(&issuer, request).await }
    }))
    .await
}
