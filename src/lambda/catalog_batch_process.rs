// src/lambda/catalog_batch_process.rs

//! SQS-triggered catalog writes.
//!
//! Returning an error fails the whole batch, which makes the queue
//! redeliver it (and eventually dead-letter it).

use aws_lambda_events::event::sqs::{SqsEvent, SqsMessage};
use lambda_runtime::{Error as LambdaError, LambdaEvent};
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::models::QueuedRowMessage;
use crate::services::{BatchSummary, CatalogWriter};

const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";

fn queued_message(index: usize, message: &SqsMessage) -> QueuedRowMessage {
    let receive_count = message
        .attributes
        .get(RECEIVE_COUNT_ATTRIBUTE)
        .and_then(|count| count.parse().ok())
        .unwrap_or(1);

    QueuedRowMessage {
        message_id: message
            .message_id
            .clone()
            .unwrap_or_else(|| format!("record-{index}")),
        receipt_handle: message.receipt_handle.clone(),
        body: message.body.clone().unwrap_or_default(),
        receive_count,
    }
}

/// Messages of an SQS batch in delivery order.
pub fn batch_messages(event: &SqsEvent) -> Vec<QueuedRowMessage> {
    event
        .records
        .iter()
        .enumerate()
        .map(|(index, message)| queued_message(index, message))
        .collect()
}

/// Write every message of the batch.
pub async fn process(writer: &CatalogWriter, event: &SqsEvent) -> Result<BatchSummary> {
    let batch = batch_messages(event);
    let redelivered = batch.iter().filter(|m| m.is_redelivery()).count();
    info!(size = batch.len(), redelivered, "Processing catalog batch");
    writer.process_batch(&batch).await
}

/// Lambda handler.
#[instrument(skip(writer, event), fields(request_id = %event.context.request_id))]
pub async fn handler(
    writer: &CatalogWriter,
    event: LambdaEvent<SqsEvent>,
) -> std::result::Result<BatchSummary, LambdaError> {
    match process(writer, &event.payload).await {
        Ok(summary) => {
            info!(
                created = summary.created,
                duplicates = summary.duplicates,
                renotified = summary.renotified,
                "Batch complete"
            );
            Ok(summary)
        }
        Err(e) => {
            error!("Batch failed, leaving it to redelivery: {}", e);
            Err(e.into())
        }
    }
}
