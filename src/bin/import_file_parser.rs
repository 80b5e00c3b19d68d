//! Lambda entry point: S3 object-created events -> queued row messages.
//!
//! ## Environment Variables
//!
//! - `SQS_QUEUE_URL`: Queue receiving one message per row (required)
//! - `UPLOADED_PREFIX` / `PARSED_PREFIX`: Stage prefixes (default: `uploaded/`, `parsed/`)
//! - `RUST_LOG` or `LOG_LEVEL`: Log filter (e.g., `info`, `debug`)

use std::sync::Arc;

use aws_lambda_events::event::s3::S3Event;
use catalog_import::lambda::{self, import_file_parser};
use catalog_import::services::RowExtractor;
use catalog_import::storage::s3::S3ObjectStore;
use catalog_import::storage::sqs::SqsChannel;
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    lambda::init_tracing();

    let config = lambda::load_lambda_config()?;
    let queue_url = lambda::required("SQS_QUEUE_URL", &config.queue.url)?;
    let aws = lambda::load_aws_config().await;

    let extractor = Arc::new(RowExtractor::new(
        &config.import,
        Arc::new(S3ObjectStore::from_conf(&aws)),
        Arc::new(SqsChannel::from_conf(&aws, queue_url)),
    ));

    info!(
        uploaded = %config.import.uploaded_prefix,
        parsed = %config.import.parsed_prefix,
        "Import file parser initialized"
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<S3Event>| {
        let extractor = Arc::clone(&extractor);
        async move { import_file_parser::handler(&extractor, event).await }
    }))
    .await
}
