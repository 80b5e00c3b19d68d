// src/services/writer.rs

//! Catalog writer service.
//!
//! Consumes a batch of queued row messages. Each row becomes a product and
//! its stock record, written together or not at all, followed by one
//! notification routed on the product price.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{Config, Notification, ProductRow, QueuedRowMessage};
use crate::storage::{CatalogStore, NotificationTopic, WriteOutcome};

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// Product created and notification published
    Created,
    /// Product already existed and was announced; nothing written or published
    Duplicate,
    /// Product already existed but its notification never went out; published now
    Renotified,
}

/// Summary of a fully successful batch.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub created: usize,
    pub duplicates: usize,
    pub renotified: usize,
}

/// Service writing queued rows into the catalog.
pub struct CatalogWriter {
    catalog: Arc<dyn CatalogStore>,
    topic: Arc<dyn NotificationTopic>,
    subject: String,
    concurrency: usize,
}

impl CatalogWriter {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn CatalogStore>,
        topic: Arc<dyn NotificationTopic>,
    ) -> Self {
        Self {
            catalog,
            topic,
            subject: config.notifications.subject.clone(),
            concurrency: config.catalog.write_concurrency.max(1),
        }
    }

    /// Process a batch delivered by the queue.
    ///
    /// Every message is attempted. If any of them fails the whole batch is
    /// reported as failed so the queue redelivers it; rows that did commit
    /// stay committed and come back as duplicates. A duplicate whose
    /// notification was never recorded is published again.
    pub async fn process_batch(&self, batch: &[QueuedRowMessage]) -> Result<BatchSummary> {
        let mut summary = BatchSummary {
            received: batch.len(),
            ..BatchSummary::default()
        };
        let mut failures: Vec<(String, AppError)> = Vec::new();

        let mut results = stream::iter(batch)
            .map(|message| async move { (message, self.process_message(message).await) })
            .buffer_unordered(self.concurrency);

        while let Some((message, result)) = results.next().await {
            match result {
                Ok(RowOutcome::Created) => summary.created += 1,
                Ok(RowOutcome::Duplicate) => summary.duplicates += 1,
                Ok(RowOutcome::Renotified) => summary.renotified += 1,
                Err(error) => {
                    log::error!(
                        "Message {} (delivery {}) failed: {}",
                        message.message_id,
                        message.receive_count,
                        error
                    );
                    failures.push((message.message_id.clone(), error));
                }
            }
        }

        if let Some((message_id, first)) = failures.first() {
            return Err(AppError::Batch {
                failed: failures.len(),
                total: batch.len(),
                first_error: format!("{message_id}: {first}"),
            });
        }

        log::info!(
            "Batch of {}: {} created, {} duplicates, {} renotified",
            summary.received,
            summary.created,
            summary.duplicates,
            summary.renotified
        );
        Ok(summary)
    }

    /// Validate, write and announce one row.
    pub async fn process_message(&self, message: &QueuedRowMessage) -> Result<RowOutcome> {
        let row = ProductRow::from_body(&message.body)?;

        match self.catalog.create_product(&row.item, &row.stock).await? {
            WriteOutcome::Created => {
                self.announce(&row).await?;
                log::info!(
                    "Created product {} ({}), price {}",
                    row.item.id,
                    row.item.title,
                    row.item.price
                );
                Ok(RowOutcome::Created)
            }
            WriteOutcome::AlreadyExists => {
                if !self.catalog.is_notified(&row.item.id).await? {
                    self.announce(&row).await?;
                    log::warn!(
                        "Product {} existed without a notification, published on delivery {}",
                        row.item.id,
                        message.receive_count
                    );
                    return Ok(RowOutcome::Renotified);
                }
                log::warn!(
                    "Product {} already exists, skipping message {} (delivery {})",
                    row.item.id,
                    message.message_id,
                    message.receive_count
                );
                Ok(RowOutcome::Duplicate)
            }
        }
    }

    /// Publish the creation notification, then record it on the product.
    ///
    /// A crash between the two steps repeats the notification on redelivery.
    async fn announce(&self, row: &ProductRow) -> Result<()> {
        let notification = Notification::product_created(&self.subject, &row.item);
        self.topic.publish(&notification).await?;
        self.catalog.mark_notified(&row.item.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceClass;
    use crate::storage::{MemoryCatalog, MemoryTopic};

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        topic: Arc<MemoryTopic>,
        writer: CatalogWriter,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let catalog = Arc::new(MemoryCatalog::new());
        let topic = Arc::new(MemoryTopic::new(config.notifications.price_threshold));
        let writer = CatalogWriter::new(
            &config,
            Arc::clone(&catalog) as Arc<dyn CatalogStore>,
            Arc::clone(&topic) as Arc<dyn NotificationTopic>,
        );
        Fixture {
            catalog,
            topic,
            writer,
        }
    }

    fn message(id: &str, body: &str) -> QueuedRowMessage {
        QueuedRowMessage::new(id, body)
    }

    fn product_body(id: &str, price: u64) -> String {
        format!(r#"{{"id":"{id}","title":"Item {id}","description":"D","price":{price},"count":5}}"#)
    }

    #[tokio::test]
    async fn test_single_message_scenario() {
        let f = fixture();
        let batch = [message(
            "m1",
            r#"{"id":"1","title":"T","description":"D","price":100,"count":5}"#,
        )];

        let summary = f.writer.process_batch(&batch).await.unwrap();

        assert_eq!(summary.created, 1);
        let item = f.catalog.product("1").unwrap();
        assert_eq!(item.title, "T");
        assert_eq!(item.description, "D");
        assert_eq!(item.price, 100);
        assert_eq!(f.catalog.stock("1").unwrap().count, 5);

        let published = f.topic.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].price, 100);
        assert_eq!(f.topic.delivered_to(PriceClass::Expensive).len(), 1);
        assert!(f.topic.delivered_to(PriceClass::Cheap).is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let f = fixture();
        let body = product_body("7", 20);

        f.writer.process_batch(&[message("m1", &body)]).await.unwrap();

        let mut again = message("m1", &body);
        again.receive_count = 2;
        let summary = f.writer.process_batch(&[again]).await.unwrap();

        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.renotified, 0);
        assert_eq!(summary.created, 0);
        assert_eq!(f.catalog.product_count(), 1);
        assert_eq!(f.catalog.stock_count(), 1);
        assert_eq!(f.topic.published().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_price_fails_without_partial_write() {
        let f = fixture();
        let batch = [message(
            "m1",
            r#"{"id":"1","title":"T","description":"D","count":5}"#,
        )];

        let err = f.writer.process_batch(&batch).await.unwrap_err();

        assert!(matches!(err, AppError::Batch { failed: 1, total: 1, .. }));
        assert!(err.to_string().contains("price"));
        assert!(f.catalog.product("1").is_none());
        assert!(f.catalog.stock("1").is_none());
        assert!(f.topic.published().is_empty());
    }

    #[tokio::test]
    async fn test_failure_propagates_but_keeps_committed_rows() {
        let f = fixture();
        let batch = [
            message("m1", &product_body("1", 10)),
            message("m2", "{not json"),
            message("m3", &product_body("3", 60)),
        ];

        let err = f.writer.process_batch(&batch).await.unwrap_err();

        assert!(matches!(err, AppError::Batch { failed: 1, total: 3, .. }));
        assert_eq!(f.catalog.product_count(), 2);
        assert_eq!(f.topic.published().len(), 2);
    }

    #[tokio::test]
    async fn test_storage_fault_is_fatal() {
        let f = fixture();
        f.catalog.set_write_failure(true);

        let err = f
            .writer
            .process_batch(&[message("m1", &product_body("1", 10))])
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Datastore error"));
        assert!(f.topic.published().is_empty());
    }

    #[tokio::test]
    async fn test_price_routing_boundary() {
        let f = fixture();
        let batch = [
            message("m1", &product_body("a", 50)),
            message("m2", &product_body("b", 49)),
        ];

        f.writer.process_batch(&batch).await.unwrap();

        let expensive = f.topic.delivered_to(PriceClass::Expensive);
        let cheap = f.topic.delivered_to(PriceClass::Cheap);
        assert_eq!(expensive.len(), 1);
        assert_eq!(expensive[0].price, 50);
        assert_eq!(cheap.len(), 1);
        assert_eq!(cheap[0].price, 49);
        assert_eq!(f.topic.delivered_to(PriceClass::All).len(), 2);
    }

    #[tokio::test]
    async fn test_publish_failure_fails_batch() {
        let f = fixture();
        f.topic.set_publish_failure(true);

        let result = f
            .writer
            .process_batch(&[message("m1", &product_body("1", 10))])
            .await;

        assert!(result.is_err());
        assert_eq!(f.catalog.product_count(), 1);
        assert!(f.topic.published().is_empty());

        f.topic.set_publish_failure(false);
        let mut again = message("m1", &product_body("1", 10));
        again.receive_count = 2;
        let summary = f.writer.process_batch(&[again]).await.unwrap();

        assert_eq!(summary.renotified, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(f.catalog.product_count(), 1);
        assert_eq!(f.topic.published().len(), 1);
        assert_eq!(f.topic.published()[0].price, 10);

        let mut third = message("m1", &product_body("1", 10));
        third.receive_count = 3;
        let summary = f.writer.process_batch(&[third]).await.unwrap();

        assert_eq!(summary.duplicates, 1);
        assert_eq!(f.topic.published().len(), 1);
    }
}
