//! AWS SNS notification topic.
//!
//! The price travels as a `Number` message attribute so that subscription
//! filter policies can route on it.

use async_trait::async_trait;
use aws_sdk_sns::Client;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::types::MessageAttributeValue;

use crate::error::{AppError, Result};
use crate::models::{Notification, PRICE_ATTRIBUTE};
use crate::storage::NotificationTopic;

/// Publishes product notifications to one topic.
#[derive(Debug, Clone)]
pub struct SnsTopic {
    client: Client,
    topic_arn: String,
}

impl SnsTopic {
    pub fn new(client: Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    pub fn from_conf(config: &aws_config::SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self::new(Client::new(config), topic_arn)
    }
}

#[async_trait]
impl NotificationTopic for SnsTopic {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        let price = MessageAttributeValue::builder()
            .data_type("Number")
            .string_value(notification.price.to_string())
            .build()
            .map_err(|e| AppError::notification(format!("Invalid price attribute: {e}")))?;

        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(&notification.subject)
            .message(&notification.message)
            .message_attributes(PRICE_ATTRIBUTE, price)
            .send()
            .await
            .map_err(|e| {
                AppError::notification(format!("Publish failed: {}", DisplayErrorContext(&e)))
            })?;

        log::debug!("Published \"{}\"", notification.message);
        Ok(())
    }
}
