//! AWS SQS message channel.

use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::error::DisplayErrorContext;

use crate::error::{AppError, Result};
use crate::storage::MessageChannel;

/// Sends one message per row to a fixed queue.
#[derive(Debug, Clone)]
pub struct SqsChannel {
    client: Client,
    queue_url: String,
}

impl SqsChannel {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    pub fn from_conf(config: &aws_config::SdkConfig, queue_url: impl Into<String>) -> Self {
        Self::new(Client::new(config), queue_url)
    }
}

#[async_trait]
impl MessageChannel for SqsChannel {
    async fn send(&self, body: &str) -> Result<()> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                AppError::queue(format!("SendMessage failed: {}", DisplayErrorContext(&e)))
            })?;

        log::debug!(
            "Queued message {}",
            output.message_id().unwrap_or("<unknown>")
        );
        Ok(())
    }
}
