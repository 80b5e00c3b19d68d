//! Service layer for the import pipeline.
//!
//! This module contains the business logic for:
//! - Row extraction from uploaded files (`RowExtractor`)
//! - Catalog writes and notifications (`CatalogWriter`)
//! - Presigned upload URLs (`UploadIssuer`)

mod extractor;
mod uploads;
mod writer;

pub use extractor::{FileFailure, FileSummary, ImportReport, RowExtractor, RowReader};
pub use uploads::{MISSING_NAME, UploadIssuer, UploadTicket};
pub use writer::{BatchSummary, CatalogWriter, RowOutcome};
