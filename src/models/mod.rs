// src/models/mod.rs

//! Domain models for the import pipeline.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod location;
mod message;
mod notification;
mod product;
mod row;

// Re-export all public types
pub use config::{
    CatalogConfig, Config, ImportConfig, LoggingConfig, MAX_QUEUE_BATCH_SIZE, NotificationConfig,
    QueueConfig,
};
pub use location::ObjectLocation;
pub use message::QueuedRowMessage;
pub use notification::{Notification, PRICE_ATTRIBUTE, PriceClass};
pub use product::{CatalogItem, InventoryRecord, ProductRow, REQUIRED_FIELDS};
pub use row::RowRecord;
