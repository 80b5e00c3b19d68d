// src/services/uploads.rs

//! Presigned upload issuer.
//!
//! Hands clients a short-lived URL that writes straight into the uploaded
//! prefix, which in turn triggers the row extractor.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{ImportConfig, ObjectLocation};
use crate::storage::UploadSigner;

/// Message returned when the file name parameter is absent.
pub const MISSING_NAME: &str = "Missing 'name' parameter in query string";

/// A presigned upload target.
#[derive(Debug, Clone, Serialize)]
pub struct UploadTicket {
    pub location: ObjectLocation,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Service issuing upload URLs into the uploaded prefix.
pub struct UploadIssuer {
    signer: Arc<dyn UploadSigner>,
    bucket: String,
    uploaded_prefix: String,
    content_type: String,
    expires_in: Duration,
}

impl UploadIssuer {
    pub fn new(config: &ImportConfig, signer: Arc<dyn UploadSigner>) -> Self {
        Self {
            signer,
            bucket: config.bucket.clone(),
            uploaded_prefix: config.uploaded_prefix.clone(),
            content_type: config.upload_content_type.clone(),
            expires_in: Duration::from_secs(config.upload_expiry_secs),
        }
    }

    /// Issue a URL for uploading `name` (the `name` query parameter).
    pub async fn issue(&self, name: Option<&str>) -> Result<UploadTicket> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::invalid_input(MISSING_NAME))?;
        if name.starts_with('/') || name.split('/').any(|part| part == "..") {
            return Err(AppError::invalid_input(format!(
                "Invalid file name '{name}'"
            )));
        }

        let key = format!("{}{}", self.uploaded_prefix, name);
        let location = ObjectLocation::new(&self.bucket, key);
        let url = self
            .signer
            .presign_put(&location, &self.content_type, self.expires_in)
            .await?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.expires_in)
                .map_err(|e| AppError::config(format!("Upload expiry out of range: {e}")))?;

        log::info!("Issued upload URL for {}", location);
        Ok(UploadTicket {
            location,
            url,
            expires_at,
        })
    }
}
