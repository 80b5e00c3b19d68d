// src/lambda/import_file_parser.rs

//! S3-triggered row extraction.
//!
//! The response carries a status so a failing file shows up in the
//! invocation result instead of crashing the function.

use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::error::{AppError, Result};
use crate::models::ObjectLocation;
use crate::services::{FileFailure, FileSummary, ImportReport, RowExtractor};

/// Invocation result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub status_code: u16,
    pub message: String,
    pub files: Vec<FileSummary>,
    pub failures: Vec<FileFailure>,
}

impl ImportResponse {
    fn from_report(report: ImportReport) -> Self {
        // Highest status wins: any server-side fault makes the whole event 500
        let status_code = report
            .failures
            .iter()
            .map(|f| f.status)
            .max()
            .unwrap_or(200);
        let message = if report.failures.is_empty() {
            format!(
                "Processed {} file(s), {} row(s) queued",
                report.files.len(),
                report.total_rows()
            )
        } else {
            format!(
                "{} of {} file(s) failed",
                report.failures.len(),
                report.failures.len() + report.files.len()
            )
        };
        Self {
            status_code,
            message,
            files: report.files,
            failures: report.failures,
        }
    }

    fn from_error(error: &AppError) -> Self {
        Self {
            status_code: error.status_code(),
            message: error.to_string(),
            files: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Object locations named by an S3 event, with keys decoded.
pub fn event_locations(event: &S3Event) -> Result<Vec<ObjectLocation>> {
    event
        .records
        .iter()
        .map(|record| {
            let bucket = record
                .s3
                .bucket
                .name
                .as_deref()
                .ok_or_else(|| AppError::invalid_input("S3 event record without bucket name"))?;
            let key = record
                .s3
                .object
                .key
                .as_deref()
                .ok_or_else(|| AppError::invalid_input("S3 event record without object key"))?;
            ObjectLocation::from_event(bucket, key)
        })
        .collect()
}

/// Process every object of the event.
pub async fn process(extractor: &RowExtractor, event: &S3Event) -> ImportResponse {
    let locations = match event_locations(event) {
        Ok(locations) => locations,
        Err(e) => {
            error!("Rejected S3 event: {}", e);
            return ImportResponse::from_error(&e);
        }
    };

    info!("Processing {} object(s)", locations.len());
    let response = ImportResponse::from_report(extractor.process_event(&locations).await);

    if response.failures.is_empty() {
        info!("{}", response.message);
    } else {
        error!(status = response.status_code, "{}", response.message);
    }
    response
}

/// Lambda handler.
#[instrument(skip(extractor, event), fields(request_id = %event.context.request_id))]
pub async fn handler(
    extractor: &RowExtractor,
    event: LambdaEvent<S3Event>,
) -> std::result::Result<ImportResponse, LambdaError> {
    Ok(process(extractor, &event.payload).await)
}
