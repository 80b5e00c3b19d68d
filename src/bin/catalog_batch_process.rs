//! Lambda entry point: SQS row batches -> catalog writes + notifications.
//!
//! ## Environment Variables
//!
//! - `TABLE_NAME_PRODUCTS` / `TABLE_NAME_STOCKS`: Catalog tables
//! - `SNS_TOPIC_ARN`: Topic receiving product notifications (required)
//! - `WRITE_CONCURRENCY`: Rows written in parallel per batch
//! - `RUST_LOG` or `LOG_LEVEL`: Log filter (e.g., `info`, `debug`)

use std::sync::Arc;

use aws_lambda_events::event::sqs::SqsEvent;
use catalog_import::lambda::{self, catalog_batch_process};
use catalog_import::services::CatalogWriter;
use catalog_import::storage::dynamodb::DynamoCatalog;
use catalog_import::storage::sns::SnsTopic;
use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    lambda::init_tracing();

    let config = lambda::load_lambda_config()?;
    let topic_arn = lambda::required("SNS_TOPIC_ARN", &config.notifications.topic_arn)?;
    let aws = lambda::load_aws_config().await;

    let writer = Arc::new(CatalogWriter::new(
        &config,
        Arc::new(DynamoCatalog::from_conf(&aws, &config.catalog)),
        Arc::new(SnsTopic::from_conf(&aws, topic_arn)),
    ));

    info!(
        products = %config.catalog.products_table,
        stocks = %config.catalog.stocks_table,
        "Catalog batch processor initialized"
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<SqsEvent>| {
        let writer = Arc::clone(&writer);
        async move { catalog_batch_process::handler(&writer, event).await }
    }))
    .await
}
