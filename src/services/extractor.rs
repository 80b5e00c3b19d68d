// src/services/extractor.rs

//! Row extractor service.
//!
//! Streams an uploaded CSV file, sends every data row to the message
//! channel and, once all rows are out, moves the file from the uploaded
//! prefix to the parsed prefix.

use std::sync::Arc;

use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::{AppError, Result};
use crate::models::{ImportConfig, ObjectLocation, RowRecord};
use crate::storage::{MessageChannel, ObjectStore};

/// Decoder for header-row CSV.
///
/// The header row names the columns; every data row must have the same
/// number of cells. Only the current record is held in memory.
pub struct RowReader<R> {
    csv: AsyncReader<R>,
    headers: StringRecord,
    record: StringRecord,
}

impl<R> RowReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Read the header row. An empty input yields no columns and no rows.
    pub async fn new(reader: R) -> Result<Self> {
        let mut csv = AsyncReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .create_reader(reader);
        let headers = csv.headers().await?.clone();
        Ok(Self {
            csv,
            headers,
            record: StringRecord::new(),
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    /// Next data row, or `None` at end of input.
    pub async fn next_row(&mut self) -> Result<Option<RowRecord>> {
        if !self.csv.read_record(&mut self.record).await? {
            return Ok(None);
        }
        Ok(Some(RowRecord::from_pairs(
            self.headers.iter().zip(self.record.iter()),
        )))
    }
}

/// A file that was fully processed and moved.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileSummary {
    pub source: ObjectLocation,
    pub destination: ObjectLocation,
    pub rows: usize,
}

/// A file that could not be processed; it stays where it was.
#[derive(Debug, Serialize)]
pub struct FileFailure {
    pub location: ObjectLocation,
    /// Rows already sent before the failure
    pub rows_sent: usize,
    pub status: u16,
    pub error: String,
}

/// Outcome of one object-created event.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub files: Vec<FileSummary>,
    pub failures: Vec<FileFailure>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }

    /// Collapse into an error when any file failed.
    pub fn into_result(self) -> Result<Vec<FileSummary>> {
        match self.failures.first() {
            None => Ok(self.files),
            Some(first) => Err(AppError::Import {
                failed: self.failures.len(),
                total: self.failures.len() + self.files.len(),
                first_error: format!("{}: {}", first.location, first.error),
            }),
        }
    }
}

/// Service turning uploaded files into queued row messages.
pub struct RowExtractor {
    objects: Arc<dyn ObjectStore>,
    channel: Arc<dyn MessageChannel>,
    uploaded_prefix: String,
    parsed_prefix: String,
    concurrency: usize,
}

impl RowExtractor {
    pub fn new(
        config: &ImportConfig,
        objects: Arc<dyn ObjectStore>,
        channel: Arc<dyn MessageChannel>,
    ) -> Self {
        Self {
            objects,
            channel,
            uploaded_prefix: config.uploaded_prefix.clone(),
            parsed_prefix: config.parsed_prefix.clone(),
            concurrency: config.max_concurrency.max(1),
        }
    }

    /// Process every object of one event independently.
    ///
    /// A failing object never hides the others: every outcome ends up in
    /// the report.
    pub async fn process_event(&self, locations: &[ObjectLocation]) -> ImportReport {
        let mut report = ImportReport::default();

        let mut outcomes = stream::iter(locations)
            .map(|location| async move {
                let mut rows_sent = 0;
                let result = self.process_object(location, &mut rows_sent).await;
                (location, rows_sent, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((location, rows_sent, result)) = outcomes.next().await {
            match result {
                Ok(summary) => {
                    log::info!(
                        "Processed {}: {} rows, moved to {}",
                        location,
                        summary.rows,
                        summary.destination
                    );
                    report.files.push(summary);
                }
                Err(error) => {
                    log::error!(
                        "Failed to process {} after {} rows: {}",
                        location,
                        rows_sent,
                        error
                    );
                    report.failures.push(FileFailure {
                        location: location.clone(),
                        rows_sent,
                        status: error.status_code(),
                        error: error.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Stream one object into the channel, then move it to the parsed prefix.
    ///
    /// `rows_sent` tracks progress so a failure can report how many rows
    /// already went out; those are not recalled.
    pub async fn process_object(
        &self,
        location: &ObjectLocation,
        rows_sent: &mut usize,
    ) -> Result<FileSummary> {
        let destination = location.relocate(&self.uploaded_prefix, &self.parsed_prefix)?;

        let reader = self.objects.open(location).await?;
        let mut rows = RowReader::new(reader).await?;

        while let Some(row) = rows.next_row().await? {
            let body = serde_json::to_string(&row)?;
            self.channel.send(&body).await?;
            *rows_sent += 1;
        }
        log::debug!("Sent {} rows from {}", rows_sent, location);

        self.relocate(location, &destination).await?;

        Ok(FileSummary {
            source: location.clone(),
            destination,
            rows: *rows_sent,
        })
    }

    /// Copy then delete; the delete only runs after a successful copy, so
    /// the object is always present somewhere.
    async fn relocate(&self, source: &ObjectLocation, destination: &ObjectLocation) -> Result<()> {
        self.objects.copy(source, destination).await?;
        if let Err(e) = self.objects.delete(source).await {
            log::warn!(
                "Copied {} to {} but could not delete the source: {}",
                source,
                destination,
                e
            );
            return Err(e);
        }
        Ok(())
    }
}
