//! Pipeline entry points.
//!
//! - `run_import`: Extract uploaded files and write their rows to the catalog

pub mod import;

pub use import::{Deliveries, ImportRunSummary, run_import};
