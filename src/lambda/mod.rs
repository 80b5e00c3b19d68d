// src/lambda/mod.rs

//! AWS Lambda handlers for the three import functions.
//!
//! - `import_file_parser`: S3 object-created event -> row messages
//! - `catalog_batch_process`: SQS batch -> catalog writes + notifications
//! - `import_products_file`: API Gateway request -> presigned upload URL
//!
//! Each binary builds its clients once in `main` and hands the service to
//! the handler for every invocation.

pub mod catalog_batch_process;
pub mod import_file_parser;
pub mod import_products_file;

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{AppError, Result};
use crate::models::Config;

/// Install the JSON tracing subscriber.
///
/// `RUST_LOG` wins over `LOG_LEVEL`. Records emitted through the `log`
/// facade by the library are forwarded to the same subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Shared AWS configuration with adaptive retries.
pub async fn load_aws_config() -> SdkConfig {
    let retry_config = RetryConfig::adaptive().with_max_attempts(3);

    aws_config::defaults(BehaviorVersion::latest())
        .retry_config(retry_config)
        .load()
        .await
}

/// Load configuration for a Lambda environment: defaults overridden by
/// the function's environment variables.
pub fn load_lambda_config() -> Result<Config> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

/// A setting only some functions need, e.g. the queue URL for the parser.
pub fn required<'a>(setting: &str, value: &'a str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(AppError::config(format!("{setting} must be set")));
    }
    Ok(value)
}
