// src/lib.rs

//! Catalog import library.
//!
//! Uploaded CSV files are split into one queued message per row; a batch
//! consumer writes each row to the catalog and announces new products on a
//! price-routed topic.

pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
